//! Halfedge mesh store.
//!
//! Arena-based halfedge structure with stable handles. Edge `e` owns the
//! halfedges `2e` and `2e + 1`, so the opposite of a halfedge is found by
//! flipping its lowest bit. Removing an element only marks its slot; handles
//! stay valid (and never get reused) for the lifetime of the store.
//!
//! Every mutator preserves 2-manifoldness. A request that would break it is
//! refused with a [`Rejection`] and leaves the mesh untouched.

// Arena indices are u32 by construction; meshes beyond 2^31 halfedges are unsupported.
#![allow(clippy::cast_possible_truncation)]

use hashbrown::{HashMap, HashSet};
use mesh_types::{Aabb, IndexedMesh, Point3, Triangle, Vector3, Vertex};
use smallvec::SmallVec;

use crate::error::{GradingError, GradingResult, Rejection};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Handle for the given arena slot.
            #[must_use]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Arena slot of this handle.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Handle of a vertex.
    VertexId
);
handle!(
    /// Handle of a directed halfedge.
    HalfedgeId
);
handle!(
    /// Handle of an undirected edge.
    EdgeId
);
handle!(
    /// Handle of a triangular face.
    FaceId
);

impl HalfedgeId {
    /// The oppositely oriented twin.
    #[must_use]
    pub const fn opposite(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// The edge this halfedge belongs to.
    #[must_use]
    pub const fn edge(self) -> EdgeId {
        EdgeId(self.0 >> 1)
    }
}

impl EdgeId {
    /// One of the two halfedges of this edge (`side` is 0 or 1).
    #[must_use]
    pub const fn halfedge(self, side: u32) -> HalfedgeId {
        HalfedgeId((self.0 << 1) | (side & 1))
    }
}

/// Per-vertex state used by the grading engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradingAttributes {
    /// Desired length of the incident edges, in mesh units.
    pub target_length: f64,
    /// Signed discrete mean curvature.
    pub mean_curvature: f64,
    /// Vertex lies on a feature line and must not be simplified away.
    pub feature: bool,
    /// Curvature could not be estimated; `target_length` is a fallback.
    pub low_confidence: bool,
}

impl GradingAttributes {
    fn blend(a: &Self, b: &Self) -> Self {
        Self {
            target_length: 0.5 * (a.target_length + b.target_length),
            mean_curvature: 0.5 * (a.mean_curvature + b.mean_curvature),
            feature: false,
            low_confidence: a.low_confidence || b.low_confidence,
        }
    }
}

#[derive(Debug, Clone)]
struct VertexRecord {
    position: Point3<f64>,
    /// Outgoing halfedge; a boundary halfedge whenever the vertex is on the boundary.
    halfedge: Option<HalfedgeId>,
    removed: bool,
}

#[derive(Debug, Clone, Copy)]
struct HalfedgeRecord {
    /// Vertex this halfedge points to.
    vertex: VertexId,
    next: HalfedgeId,
    prev: HalfedgeId,
    /// `None` for boundary halfedges.
    face: Option<FaceId>,
}

#[derive(Debug, Clone, Copy)]
struct FaceRecord {
    halfedge: HalfedgeId,
    removed: bool,
}

/// Manifold triangle mesh with halfedge connectivity and grading attributes.
#[derive(Debug, Clone)]
pub struct HalfedgeMesh {
    vertices: Vec<VertexRecord>,
    halfedges: Vec<HalfedgeRecord>,
    faces: Vec<FaceRecord>,
    edge_removed: Vec<bool>,
    edge_feature: Vec<bool>,
    attributes: Vec<GradingAttributes>,
    removed_vertices: usize,
    removed_edges: usize,
    removed_faces: usize,
}

/// Iterator over the outgoing halfedges of a vertex, in counter-clockwise order.
pub struct OutgoingHalfedges<'a> {
    mesh: &'a HalfedgeMesh,
    start: Option<HalfedgeId>,
    current: Option<HalfedgeId>,
}

impl Iterator for OutgoingHalfedges<'_> {
    type Item = HalfedgeId;

    fn next(&mut self) -> Option<HalfedgeId> {
        let h = self.current?;
        let next = self.mesh.ccw_rotated(h);
        self.current = if Some(next) == self.start { None } else { Some(next) };
        Some(h)
    }
}

impl HalfedgeMesh {
    /// Build the store from an indexed mesh.
    ///
    /// Vertex normals stored in the input are ignored.
    ///
    /// # Errors
    ///
    /// - [`GradingError::NonFiniteVertex`] if a position has a NaN or infinite coordinate
    /// - [`GradingError::InvalidFaceIndex`] if a face references a missing vertex
    /// - [`GradingError::NonManifold`] if an edge borders more than two faces,
    ///   two faces disagree on orientation, a face repeats a vertex, or a
    ///   vertex has more than one fan of faces
    pub fn from_indexed(mesh: &IndexedMesh) -> GradingResult<Self> {
        if let Some((index, v)) = mesh
            .vertices
            .iter()
            .enumerate()
            .find(|(_, v)| !v.position.coords.iter().all(|c| c.is_finite()))
        {
            let p = v.position;
            return Err(GradingError::NonFiniteVertex {
                index,
                x: p.x,
                y: p.y,
                z: p.z,
            });
        }

        let vertex_count = mesh.vertices.len();
        let mut store = Self {
            vertices: mesh
                .vertices
                .iter()
                .map(|v| VertexRecord {
                    position: v.position,
                    halfedge: None,
                    removed: false,
                })
                .collect(),
            halfedges: Vec::with_capacity(mesh.faces.len() * 3),
            faces: Vec::with_capacity(mesh.faces.len()),
            edge_removed: Vec::new(),
            edge_feature: Vec::new(),
            attributes: vec![GradingAttributes::default(); vertex_count],
            removed_vertices: 0,
            removed_edges: 0,
            removed_faces: 0,
        };

        let mut directed: HashMap<(u32, u32), HalfedgeId> =
            HashMap::with_capacity(mesh.faces.len() * 3);

        for (face_index, face) in mesh.faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(GradingError::InvalidFaceIndex {
                    face: face_index,
                    index: bad,
                    vertex_count,
                });
            }
            if face[0] == face[1] || face[1] == face[2] || face[2] == face[0] {
                return Err(non_manifold(format!("face {face_index} repeats a vertex")));
            }

            let f = FaceId(store.faces.len() as u32);
            let mut corner = [HalfedgeId(0); 3];
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                let h = match directed.get(&(a, b)) {
                    Some(&h) => h,
                    None => {
                        let h = store.push_edge(VertexId(a), VertexId(b));
                        directed.insert((a, b), h);
                        directed.insert((b, a), h.opposite());
                        h
                    }
                };
                if store.halfedges[h.index()].face.is_some() {
                    return Err(non_manifold(format!(
                        "edge ({a}, {b}) of face {face_index} is used twice with the same orientation"
                    )));
                }
                store.halfedges[h.index()].face = Some(f);
                corner[i] = h;
            }
            for i in 0..3 {
                store.link(corner[i], corner[(i + 1) % 3]);
                store.vertices[face[i] as usize].halfedge = Some(corner[i]);
            }
            store.faces.push(FaceRecord {
                halfedge: corner[0],
                removed: false,
            });
        }

        // Link boundary halfedges into loops.
        let mut boundary_out: HashMap<VertexId, HalfedgeId> = HashMap::new();
        for index in 0..store.halfedges.len() {
            let h = HalfedgeId(index as u32);
            if store.halfedges[index].face.is_none() {
                let from = store.from_vertex(h);
                if boundary_out.insert(from, h).is_some() {
                    return Err(non_manifold(format!(
                        "vertex {} has more than one boundary fan",
                        from.0
                    )));
                }
            }
        }
        for (&from, &h) in &boundary_out {
            let to = store.to_vertex(h);
            let Some(&next) = boundary_out.get(&to) else {
                return Err(non_manifold(format!("boundary is open at vertex {}", to.0)));
            };
            store.link(h, next);
            store.vertices[from.index()].halfedge = Some(h);
        }

        // Every vertex must be covered by a single fan.
        let mut outgoing = vec![0usize; vertex_count];
        for index in 0..store.halfedges.len() {
            outgoing[store.from_vertex(HalfedgeId(index as u32)).index()] += 1;
        }
        for (v, &count) in outgoing.iter().enumerate() {
            let fan = store.outgoing(VertexId(v as u32)).take(count + 1).count();
            if fan != count {
                return Err(non_manifold(format!("vertex {v} has more than one fan of faces")));
            }
        }

        Ok(store)
    }

    /// Export live vertices and faces as a compact indexed mesh.
    ///
    /// Vertices without incident faces are dropped. Vertex normals are
    /// filled from [`vertex_normal`](Self::vertex_normal).
    #[must_use]
    pub fn to_indexed(&self) -> IndexedMesh {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut out = IndexedMesh::with_capacity(self.vertex_count(), self.face_count());
        for v in self.vertices() {
            if self.vertices[v.index()].halfedge.is_none() {
                continue;
            }
            remap[v.index()] = out.vertices.len() as u32;
            let position = self.position(v);
            out.vertices.push(match self.vertex_normal(v) {
                Some(normal) => Vertex::with_normal(position, normal),
                None => Vertex::new(position),
            });
        }
        for f in self.faces() {
            let [a, b, c] = self.face_vertices(f);
            out.faces
                .push([remap[a.index()], remap[b.index()], remap[c.index()]]);
        }
        out
    }

    // ----- allocation and low-level links -----

    fn push_edge(&mut self, from: VertexId, to: VertexId) -> HalfedgeId {
        let h = HalfedgeId(self.halfedges.len() as u32);
        let record = |vertex| HalfedgeRecord {
            vertex,
            next: h,
            prev: h,
            face: None,
        };
        self.halfedges.push(record(to));
        self.halfedges.push(record(from));
        self.edge_removed.push(false);
        self.edge_feature.push(false);
        h
    }

    fn push_vertex(&mut self, position: Point3<f64>, attributes: GradingAttributes) -> VertexId {
        let v = VertexId(self.vertices.len() as u32);
        self.vertices.push(VertexRecord {
            position,
            halfedge: None,
            removed: false,
        });
        self.attributes.push(attributes);
        v
    }

    fn push_face(&mut self, halfedge: HalfedgeId) -> FaceId {
        let f = FaceId(self.faces.len() as u32);
        self.faces.push(FaceRecord {
            halfedge,
            removed: false,
        });
        f
    }

    fn link(&mut self, h: HalfedgeId, next: HalfedgeId) {
        self.halfedges[h.index()].next = next;
        self.halfedges[next.index()].prev = h;
    }

    fn set_face(&mut self, h: HalfedgeId, face: Option<FaceId>) {
        self.halfedges[h.index()].face = face;
    }

    fn set_target(&mut self, h: HalfedgeId, v: VertexId) {
        self.halfedges[h.index()].vertex = v;
    }

    fn set_vertex_halfedge(&mut self, v: VertexId, h: Option<HalfedgeId>) {
        self.vertices[v.index()].halfedge = h;
    }

    fn set_face_halfedge(&mut self, f: FaceId, h: HalfedgeId) {
        self.faces[f.index()].halfedge = h;
    }

    /// Make a boundary vertex point at its outgoing boundary halfedge.
    fn adjust_outgoing_halfedge(&mut self, v: VertexId) {
        let boundary = self.outgoing(v).find(|&h| self.is_boundary_halfedge(h));
        if let Some(h) = boundary {
            self.set_vertex_halfedge(v, Some(h));
        }
    }

    // ----- navigation -----

    /// Vertex a halfedge points to.
    #[must_use]
    pub fn to_vertex(&self, h: HalfedgeId) -> VertexId {
        self.halfedges[h.index()].vertex
    }

    /// Vertex a halfedge starts from.
    #[must_use]
    pub fn from_vertex(&self, h: HalfedgeId) -> VertexId {
        self.to_vertex(h.opposite())
    }

    /// Next halfedge in the same face (or boundary loop).
    #[must_use]
    pub fn next(&self, h: HalfedgeId) -> HalfedgeId {
        self.halfedges[h.index()].next
    }

    /// Previous halfedge in the same face (or boundary loop).
    #[must_use]
    pub fn prev(&self, h: HalfedgeId) -> HalfedgeId {
        self.halfedges[h.index()].prev
    }

    /// Face of a halfedge, `None` on the boundary.
    #[must_use]
    pub fn face(&self, h: HalfedgeId) -> Option<FaceId> {
        self.halfedges[h.index()].face
    }

    /// One outgoing halfedge of a vertex, `None` if the vertex is isolated.
    #[must_use]
    pub fn vertex_halfedge(&self, v: VertexId) -> Option<HalfedgeId> {
        self.vertices[v.index()].halfedge
    }

    /// First halfedge of a face.
    #[must_use]
    pub fn face_halfedge(&self, f: FaceId) -> HalfedgeId {
        self.faces[f.index()].halfedge
    }

    /// Next outgoing halfedge counter-clockwise around its source vertex.
    #[must_use]
    pub fn ccw_rotated(&self, h: HalfedgeId) -> HalfedgeId {
        self.prev(h).opposite()
    }

    /// Next outgoing halfedge clockwise around its source vertex.
    #[must_use]
    pub fn cw_rotated(&self, h: HalfedgeId) -> HalfedgeId {
        self.next(h.opposite())
    }

    /// Outgoing halfedges of a vertex in counter-clockwise order.
    ///
    /// For a boundary vertex the iteration starts at the boundary halfedge.
    #[must_use]
    pub fn outgoing(&self, v: VertexId) -> OutgoingHalfedges<'_> {
        let start = self.vertex_halfedge(v);
        OutgoingHalfedges {
            mesh: self,
            start,
            current: start,
        }
    }

    /// Neighbors of a vertex in counter-clockwise order.
    #[must_use]
    pub fn one_ring(&self, v: VertexId) -> SmallVec<[VertexId; 8]> {
        self.outgoing(v).map(|h| self.to_vertex(h)).collect()
    }

    /// Faces around a vertex in counter-clockwise order.
    #[must_use]
    pub fn vertex_faces(&self, v: VertexId) -> SmallVec<[FaceId; 8]> {
        self.outgoing(v).filter_map(|h| self.face(h)).collect()
    }

    /// Number of edges incident to a vertex.
    #[must_use]
    pub fn valence(&self, v: VertexId) -> usize {
        self.outgoing(v).count()
    }

    /// Halfedge from `a` to `b`, if the two vertices are connected.
    #[must_use]
    pub fn find_halfedge(&self, a: VertexId, b: VertexId) -> Option<HalfedgeId> {
        self.outgoing(a).find(|&h| self.to_vertex(h) == b)
    }

    /// Endpoints of an edge, in the direction of its first halfedge.
    #[must_use]
    pub fn edge_vertices(&self, e: EdgeId) -> (VertexId, VertexId) {
        let h = e.halfedge(0);
        (self.from_vertex(h), self.to_vertex(h))
    }

    /// Corners of a face in winding order.
    #[must_use]
    pub fn face_vertices(&self, f: FaceId) -> [VertexId; 3] {
        let h = self.face_halfedge(f);
        [
            self.from_vertex(h),
            self.to_vertex(h),
            self.to_vertex(self.next(h)),
        ]
    }

    // ----- queries -----

    /// Whether a halfedge has no face.
    #[must_use]
    pub fn is_boundary_halfedge(&self, h: HalfedgeId) -> bool {
        self.face(h).is_none()
    }

    /// Whether an edge borders only one face.
    #[must_use]
    pub fn is_boundary_edge(&self, e: EdgeId) -> bool {
        self.is_boundary_halfedge(e.halfedge(0)) || self.is_boundary_halfedge(e.halfedge(1))
    }

    /// Whether a vertex lies on the boundary (isolated vertices count as boundary).
    #[must_use]
    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        self.vertex_halfedge(v)
            .is_none_or(|h| self.is_boundary_halfedge(h))
    }

    /// Position of a vertex.
    #[must_use]
    pub fn position(&self, v: VertexId) -> Point3<f64> {
        self.vertices[v.index()].position
    }

    /// Length of an edge.
    #[must_use]
    pub fn edge_length(&self, e: EdgeId) -> f64 {
        let (a, b) = self.edge_vertices(e);
        (self.position(b) - self.position(a)).norm()
    }

    /// Midpoint of an edge.
    #[must_use]
    pub fn edge_midpoint(&self, e: EdgeId) -> Point3<f64> {
        let (a, b) = self.edge_vertices(e);
        nalgebra::center(&self.position(a), &self.position(b))
    }

    /// Triangle with the positions of a face.
    #[must_use]
    pub fn triangle(&self, f: FaceId) -> Triangle {
        let [a, b, c] = self.face_vertices(f);
        Triangle::new(self.position(a), self.position(b), self.position(c))
    }

    /// Unit normal of a face, `None` if degenerate.
    #[must_use]
    pub fn face_normal(&self, f: FaceId) -> Option<Vector3<f64>> {
        self.triangle(f).normal()
    }

    /// Angle-weighted average of the incident face normals.
    ///
    /// Returns `None` for isolated vertices and when every incident face is
    /// degenerate.
    #[must_use]
    pub fn vertex_normal(&self, v: VertexId) -> Option<Vector3<f64>> {
        let p = self.position(v);
        let mut sum = Vector3::zeros();
        for h in self.outgoing(v) {
            if self.is_boundary_halfedge(h) {
                continue;
            }
            let a = self.position(self.to_vertex(h));
            let b = self.position(self.to_vertex(self.next(h)));
            let (u, w) = (a - p, b - p);
            let n = u.cross(&w);
            let len = n.norm();
            let denom = u.norm() * w.norm();
            if len <= f64::EPSILON || denom <= f64::EPSILON {
                continue;
            }
            let angle = (u.dot(&w) / denom).clamp(-1.0, 1.0).acos();
            sum += n * (angle / len);
        }
        let len = sum.norm();
        (len > f64::EPSILON).then(|| sum / len)
    }

    /// Grading attributes of a vertex.
    #[must_use]
    pub fn attributes(&self, v: VertexId) -> &GradingAttributes {
        &self.attributes[v.index()]
    }

    /// Mutable grading attributes of a vertex.
    pub fn attributes_mut(&mut self, v: VertexId) -> &mut GradingAttributes {
        &mut self.attributes[v.index()]
    }

    /// Whether an edge is marked as a feature edge.
    #[must_use]
    pub fn is_feature_edge(&self, e: EdgeId) -> bool {
        self.edge_feature[e.index()]
    }

    /// Mark or unmark an edge as a feature edge.
    pub fn set_feature_edge(&mut self, e: EdgeId, feature: bool) {
        self.edge_feature[e.index()] = feature;
    }

    /// Bounding box of the live vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for v in self.vertices() {
            aabb.expand_to_include(&self.vertices[v.index()].position);
        }
        aabb
    }

    // ----- iteration and counts -----

    /// Live vertices.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.removed)
            .map(|(i, _)| VertexId(i as u32))
    }

    /// Live edges.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_removed
            .iter()
            .enumerate()
            .filter(|(_, removed)| !**removed)
            .map(|(i, _)| EdgeId(i as u32))
    }

    /// Live faces.
    pub fn faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.removed)
            .map(|(i, _)| FaceId(i as u32))
    }

    /// Number of live vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() - self.removed_vertices
    }

    /// Number of live edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_removed.len() - self.removed_edges
    }

    /// Number of live faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len() - self.removed_faces
    }

    /// Size of the vertex arena, including removed slots.
    #[must_use]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Whether a vertex slot has been removed.
    #[must_use]
    pub fn is_removed_vertex(&self, v: VertexId) -> bool {
        self.vertices.get(v.index()).is_none_or(|r| r.removed)
    }

    /// Whether an edge slot has been removed.
    #[must_use]
    pub fn is_removed_edge(&self, e: EdgeId) -> bool {
        self.edge_removed.get(e.index()).is_none_or(|&r| r)
    }

    // ----- mutators -----

    /// Move a vertex. Connectivity is unaffected.
    ///
    /// # Errors
    ///
    /// [`Rejection::Removed`] if the vertex no longer exists.
    pub fn move_vertex(&mut self, v: VertexId, position: Point3<f64>) -> Result<(), Rejection> {
        if self.is_removed_vertex(v) {
            return Err(Rejection::Removed);
        }
        self.vertices[v.index()].position = position;
        Ok(())
    }

    /// Split an edge by inserting a new vertex at `position`.
    ///
    /// Each face adjacent to the edge is split in two. The new vertex gets
    /// the average of the endpoint attributes; splitting a feature edge
    /// yields a feature vertex between two feature edges.
    ///
    /// # Errors
    ///
    /// [`Rejection::Removed`] if the edge no longer exists.
    pub fn split_edge(&mut self, e: EdgeId, position: Point3<f64>) -> Result<VertexId, Rejection> {
        if self.is_removed_edge(e) {
            return Err(Rejection::Removed);
        }
        let (va, vb) = self.edge_vertices(e);
        let mut attributes = GradingAttributes::blend(self.attributes(va), self.attributes(vb));
        let feature = self.is_feature_edge(e);
        attributes.feature = feature;
        let v = self.push_vertex(position, attributes);

        // h0: va -> vb becomes v -> vb; o0: vb -> va becomes vb -> v.
        let h0 = e.halfedge(0);
        let o0 = e.halfedge(1);
        let v2 = self.to_vertex(o0);
        let e1 = self.push_edge(v, v2);
        let t1 = e1.opposite();
        self.edge_feature[e1.edge().index()] = feature;
        let f0 = self.face(h0);
        let f3 = self.face(o0);

        self.set_vertex_halfedge(v, Some(h0));
        self.set_target(o0, v);

        if let Some(f0) = f0 {
            let h1 = self.next(h0);
            let h2 = self.next(h1);
            let v1 = self.to_vertex(h1);
            let e0 = self.push_edge(v, v1);
            let t0 = e0.opposite();
            let f1 = self.push_face(h2);
            self.set_face_halfedge(f0, h0);
            self.set_face(h1, Some(f0));
            self.set_face(t0, Some(f0));
            self.set_face(h0, Some(f0));
            self.set_face(h2, Some(f1));
            self.set_face(t1, Some(f1));
            self.set_face(e0, Some(f1));
            self.link(h0, h1);
            self.link(h1, t0);
            self.link(t0, h0);
            self.link(e0, h2);
            self.link(h2, t1);
            self.link(t1, e0);
        } else {
            let before = self.prev(h0);
            self.link(before, t1);
            self.link(t1, h0);
        }

        if let Some(f3) = f3 {
            let o1 = self.next(o0);
            let o2 = self.next(o1);
            let v3 = self.to_vertex(o1);
            let e2 = self.push_edge(v, v3);
            let t2 = e2.opposite();
            let f2 = self.push_face(o1);
            self.set_face_halfedge(f3, o0);
            self.set_face(o1, Some(f2));
            self.set_face(t2, Some(f2));
            self.set_face(e1, Some(f2));
            self.set_face(o2, Some(f3));
            self.set_face(o0, Some(f3));
            self.set_face(e2, Some(f3));
            self.link(e1, o1);
            self.link(o1, t2);
            self.link(t2, e1);
            self.link(o0, e2);
            self.link(e2, o2);
            self.link(o2, o0);
        } else {
            let after = self.next(o0);
            self.link(e1, after);
            self.link(o0, e1);
        }

        if self.vertex_halfedge(v2) == Some(h0) {
            self.set_vertex_halfedge(v2, Some(t1));
        }
        self.adjust_outgoing_halfedge(v);
        Ok(v)
    }

    /// Check whether removing `from_vertex(h)` by collapsing it into
    /// `to_vertex(h)` keeps the mesh manifold.
    ///
    /// # Errors
    ///
    /// The reason the collapse is not allowed.
    pub fn check_collapse(&self, h: HalfedgeId) -> Result<(), Rejection> {
        if self.is_removed_edge(h.edge()) {
            return Err(Rejection::Removed);
        }
        let o = h.opposite();
        let v0 = self.from_vertex(h);
        let v1 = self.to_vertex(h);

        let mut left = None;
        let mut right = None;
        for (side, apex) in [(h, &mut left), (o, &mut right)] {
            if self.is_boundary_halfedge(side) {
                continue;
            }
            let h1 = self.next(side);
            let h2 = self.next(h1);
            if self.is_boundary_halfedge(h1.opposite()) && self.is_boundary_halfedge(h2.opposite())
            {
                return Err(Rejection::BoundaryFan);
            }
            let tip = self.to_vertex(h1);
            if !self.is_boundary_vertex(tip) && self.valence(tip) <= 3 {
                return Err(Rejection::Degenerate);
            }
            *apex = Some(tip);
        }
        if left == right {
            return Err(Rejection::LinkCondition);
        }

        if self.is_boundary_vertex(v0) && self.is_boundary_vertex(v1) && !self.is_boundary_edge(h.edge())
        {
            return Err(Rejection::BoundaryBridge);
        }

        let ring0: HashSet<VertexId> = self.one_ring(v0).into_iter().collect();
        let shared = self
            .one_ring(v1)
            .into_iter()
            .any(|w| ring0.contains(&w) && Some(w) != left && Some(w) != right);
        if shared {
            return Err(Rejection::LinkCondition);
        }
        Ok(())
    }

    /// Collapse an edge, keeping `surviving` and removing the other endpoint.
    ///
    /// The surviving vertex keeps its position and attributes.
    ///
    /// # Errors
    ///
    /// - [`Rejection::NotEndpoint`] if `surviving` is not on the edge
    /// - any reason reported by [`check_collapse`](Self::check_collapse)
    pub fn collapse_edge(&mut self, e: EdgeId, surviving: VertexId) -> Result<(), Rejection> {
        if self.is_removed_edge(e) {
            return Err(Rejection::Removed);
        }
        let h = if self.to_vertex(e.halfedge(0)) == surviving {
            e.halfedge(0)
        } else if self.to_vertex(e.halfedge(1)) == surviving {
            e.halfedge(1)
        } else {
            return Err(Rejection::NotEndpoint);
        };
        self.check_collapse(h)?;

        let h1 = self.prev(h);
        let o1 = self.next(h.opposite());
        self.remove_edge(h);
        if self.next(self.next(h1)) == h1 {
            self.remove_loop(h1);
        }
        if self.next(self.next(o1)) == o1 {
            self.remove_loop(o1);
        }
        Ok(())
    }

    /// Remove edge `h` by merging its source vertex into its target.
    fn remove_edge(&mut self, h: HalfedgeId) {
        let hn = self.next(h);
        let hp = self.prev(h);
        let o = h.opposite();
        let on = self.next(o);
        let op = self.prev(o);
        let fh = self.face(h);
        let fo = self.face(o);
        let vh = self.to_vertex(h);
        let vo = self.to_vertex(o);

        let incoming: SmallVec<[HalfedgeId; 8]> =
            self.outgoing(vo).map(HalfedgeId::opposite).collect();
        for hc in incoming {
            self.set_target(hc, vh);
        }

        self.link(hp, hn);
        self.link(op, on);

        if let Some(fh) = fh {
            self.set_face_halfedge(fh, hn);
        }
        if let Some(fo) = fo {
            self.set_face_halfedge(fo, on);
        }

        if self.vertex_halfedge(vh) == Some(o) {
            self.set_vertex_halfedge(vh, Some(hn));
        }
        self.adjust_outgoing_halfedge(vh);
        self.set_vertex_halfedge(vo, None);

        self.vertices[vo.index()].removed = true;
        self.removed_vertices += 1;
        self.edge_removed[h.edge().index()] = true;
        self.removed_edges += 1;
    }

    /// Remove the two-halfedge loop starting at `h`, left behind by a
    /// collapse, merging its edges into one.
    fn remove_loop(&mut self, h: HalfedgeId) {
        let h0 = h;
        let h1 = self.next(h0);
        let o0 = h0.opposite();
        let o1 = h1.opposite();
        let v0 = self.to_vertex(h0);
        let v1 = self.to_vertex(h1);
        let fh = self.face(h0);
        let fo = self.face(o0);

        let after = self.next(o0);
        let before = self.prev(o0);
        self.link(h1, after);
        self.link(before, h1);

        self.set_face(h1, fo);

        self.set_vertex_halfedge(v0, Some(h1));
        self.adjust_outgoing_halfedge(v0);
        self.set_vertex_halfedge(v1, Some(o1));
        self.adjust_outgoing_halfedge(v1);

        if let Some(fo) = fo {
            if self.face_halfedge(fo) == o0 {
                self.set_face_halfedge(fo, h1);
            }
        }

        if self.edge_feature[h0.edge().index()] {
            self.edge_feature[h1.edge().index()] = true;
        }
        if let Some(fh) = fh {
            self.faces[fh.index()].removed = true;
            self.removed_faces += 1;
        }
        self.edge_removed[h0.edge().index()] = true;
        self.removed_edges += 1;
    }

    /// Check whether an edge can be flipped.
    ///
    /// # Errors
    ///
    /// The reason the flip is not allowed.
    pub fn check_flip(&self, e: EdgeId) -> Result<(), Rejection> {
        if self.is_removed_edge(e) {
            return Err(Rejection::Removed);
        }
        if self.is_boundary_edge(e) {
            return Err(Rejection::BoundaryEdge);
        }
        let (a0, b0) = (e.halfedge(0), e.halfedge(1));
        let va1 = self.to_vertex(self.next(a0));
        let vb1 = self.to_vertex(self.next(b0));
        if va1 == vb1 || self.find_halfedge(va1, vb1).is_some() {
            return Err(Rejection::ExistingEdge);
        }
        let va0 = self.to_vertex(a0);
        let vb0 = self.to_vertex(b0);
        let (p, q) = (self.position(va1), self.position(vb1));
        let degenerate = [
            Triangle::new(q, p, self.position(vb0)),
            Triangle::new(p, q, self.position(va0)),
        ]
        .iter()
        .any(|t| t.is_degenerate(DEGENERATE_EPSILON));
        if degenerate {
            return Err(Rejection::Degenerate);
        }
        Ok(())
    }

    /// Flip an interior edge to connect the two opposite vertices.
    ///
    /// # Errors
    ///
    /// Any reason reported by [`check_flip`](Self::check_flip).
    pub fn flip_edge(&mut self, e: EdgeId) -> Result<(), Rejection> {
        self.check_flip(e)?;

        let a0 = e.halfedge(0);
        let b0 = e.halfedge(1);
        let a1 = self.next(a0);
        let a2 = self.next(a1);
        let b1 = self.next(b0);
        let b2 = self.next(b1);
        let va0 = self.to_vertex(a0);
        let va1 = self.to_vertex(a1);
        let vb0 = self.to_vertex(b0);
        let vb1 = self.to_vertex(b1);
        let fa = self.face(a0);
        let fb = self.face(b0);

        self.set_target(a0, va1);
        self.set_target(b0, vb1);

        self.link(a0, a2);
        self.link(a2, b1);
        self.link(b1, a0);

        self.link(b0, b2);
        self.link(b2, a1);
        self.link(a1, b0);

        self.set_face(a1, fb);
        self.set_face(b1, fa);

        if let Some(fa) = fa {
            self.set_face_halfedge(fa, a0);
        }
        if let Some(fb) = fb {
            self.set_face_halfedge(fb, b0);
        }

        if self.vertex_halfedge(va0) == Some(b0) {
            self.set_vertex_halfedge(va0, Some(a1));
        }
        if self.vertex_halfedge(vb0) == Some(a0) {
            self.set_vertex_halfedge(vb0, Some(b1));
        }
        self.edge_feature[e.index()] = false;
        Ok(())
    }

    // ----- consistency -----

    /// Verify the connectivity invariants of the store.
    ///
    /// Checks link symmetry, triangular faces, single fans per vertex,
    /// boundary halfedge selection, and absence of duplicate edges.
    ///
    /// # Errors
    ///
    /// [`GradingError::InvalidTopology`] describing the first violation.
    pub fn validate(&self) -> GradingResult<()> {
        let broken = |msg: String| Err(GradingError::InvalidTopology(msg));
        let mut outgoing = vec![0usize; self.vertices.len()];
        let mut pairs = HashSet::with_capacity(self.edge_count());

        for e in self.edges() {
            let (a, b) = self.edge_vertices(e);
            if a == b {
                return broken(format!("edge {} is a loop", e.0));
            }
            if self.is_removed_vertex(a) || self.is_removed_vertex(b) {
                return broken(format!("edge {} references a removed vertex", e.0));
            }
            if !pairs.insert((a.min(b), a.max(b))) {
                return broken(format!("vertices {} and {} are joined twice", a.0, b.0));
            }
            for h in [e.halfedge(0), e.halfedge(1)] {
                if self.prev(self.next(h)) != h || self.next(self.prev(h)) != h {
                    return broken(format!("halfedge {} has asymmetric links", h.0));
                }
                if self.from_vertex(self.next(h)) != self.to_vertex(h) {
                    return broken(format!("halfedge {} is not followed by its successor", h.0));
                }
                if self.is_removed_edge(self.next(h).edge()) {
                    return broken(format!("halfedge {} links to a removed edge", h.0));
                }
                match self.face(h) {
                    Some(f) if self.faces[f.index()].removed => {
                        return broken(format!("halfedge {} borders removed face {}", h.0, f.0));
                    }
                    Some(f) => {
                        if self.face(self.next(h)) != Some(f) || self.next(self.next(self.next(h))) != h
                        {
                            return broken(format!("face {} is not a triangle", f.0));
                        }
                    }
                    None => {}
                }
                outgoing[self.from_vertex(h).index()] += 1;
            }
        }

        for v in self.vertices() {
            let count = outgoing[v.index()];
            let Some(h) = self.vertex_halfedge(v) else {
                if count > 0 {
                    return broken(format!("vertex {} has edges but no halfedge", v.0));
                }
                continue;
            };
            if self.from_vertex(h) != v || self.is_removed_edge(h.edge()) {
                return broken(format!("vertex {} points at a foreign halfedge", v.0));
            }
            let fan = self.outgoing(v).take(count + 1).count();
            if fan != count {
                return broken(format!("vertex {} has {} edges but a fan of {}", v.0, count, fan));
            }
            let on_boundary = self.outgoing(v).any(|h| self.is_boundary_halfedge(h));
            if on_boundary && !self.is_boundary_halfedge(h) {
                return broken(format!("boundary vertex {} has an interior halfedge", v.0));
            }
        }

        for f in self.faces() {
            let h = self.face_halfedge(f);
            if self.face(h) != Some(f) {
                return broken(format!("face {} points at a foreign halfedge", f.0));
            }
        }
        Ok(())
    }
}

/// Area-to-squared-length ratio below which a triangle counts as degenerate.
pub(crate) const DEGENERATE_EPSILON: f64 = 1e-10;

fn non_manifold(reason: String) -> GradingError {
    GradingError::NonManifold { reason }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::primitives;

    /// Two triangles sharing the diagonal (0, 2) of a unit square.
    fn square() -> HalfedgeMesh {
        let mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        HalfedgeMesh::from_indexed(&mesh).unwrap()
    }

    fn edge_between(mesh: &HalfedgeMesh, a: u32, b: u32) -> EdgeId {
        mesh.find_halfedge(VertexId::new(a), VertexId::new(b))
            .expect("edge exists")
            .edge()
    }

    #[test]
    fn build_square() {
        let mesh = square();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.edge_count(), 5);
        assert_eq!(mesh.face_count(), 2);
        mesh.validate().unwrap();
        assert!(mesh.is_boundary_vertex(VertexId::new(0)));
        assert!(!mesh.is_boundary_edge(edge_between(&mesh, 0, 2)));
        assert!(mesh.is_boundary_edge(edge_between(&mesh, 0, 1)));
        assert_eq!(mesh.valence(VertexId::new(0)), 3);
    }

    #[test]
    fn build_closed_sphere() {
        let mesh = HalfedgeMesh::from_indexed(&primitives::icosphere(1.0, 2)).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.vertices().all(|v| !mesh.is_boundary_vertex(v)));
        let euler = mesh.vertex_count() as i64 - mesh.edge_count() as i64 + mesh.face_count() as i64;
        assert_eq!(euler, 2);
    }

    #[test]
    fn reject_non_finite_position() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, f64::INFINITY, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ];
        let mesh = IndexedMesh::from_positions(positions, vec![[0, 1, 2]]);
        let err = HalfedgeMesh::from_indexed(&mesh).unwrap_err();
        assert!(matches!(err, GradingError::NonFiniteVertex { index: 1, .. }));
    }

    #[test]
    fn reject_bad_index() {
        let mesh = IndexedMesh::from_positions(vec![Point3::origin(); 3], vec![[0, 1, 7]]);
        let err = HalfedgeMesh::from_indexed(&mesh).unwrap_err();
        assert!(matches!(err, GradingError::InvalidFaceIndex { face: 0, index: 7, .. }));
    }

    #[test]
    fn reject_three_faces_on_one_edge() {
        let mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, -1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        assert!(matches!(
            HalfedgeMesh::from_indexed(&mesh),
            Err(GradingError::NonManifold { .. })
        ));
    }

    #[test]
    fn reject_bowtie_vertex() {
        let mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(-1.0, -1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 3, 4]],
        );
        assert!(matches!(
            HalfedgeMesh::from_indexed(&mesh),
            Err(GradingError::NonManifold { .. })
        ));
    }

    #[test]
    fn roundtrip_indexed() {
        let original = primitives::disc(2.0, 2, 8);
        let mesh = HalfedgeMesh::from_indexed(&original).unwrap();
        let mut exported = mesh.to_indexed();
        assert!(exported.vertices.iter().all(|v| v.normal.is_some()));
        exported.clear_normals();
        assert_eq!(exported, original);
    }

    #[test]
    fn one_ring_is_ordered() {
        let mesh = HalfedgeMesh::from_indexed(&primitives::disc(1.0, 1, 6)).unwrap();
        let ring = mesh.one_ring(VertexId::new(0));
        assert_eq!(ring.len(), 6);
        // consecutive neighbors share a face with the center
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
            assert!(mesh.find_halfedge(a, b).is_some());
        }
    }

    #[test]
    fn vertex_normal_of_flat_patch() {
        let mesh = square();
        let n = mesh.vertex_normal(VertexId::new(0)).unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn export_carries_vertex_normals() {
        let exported = square().to_indexed();
        for v in &exported.vertices {
            let n = v.normal.unwrap();
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn split_interior_edge() {
        let mut mesh = square();
        let e = edge_between(&mesh, 0, 2);
        let mid = mesh.edge_midpoint(e);
        let v = mesh.split_edge(e, mid).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.valence(v), 4);
        assert!(!mesh.is_boundary_vertex(v));
    }

    #[test]
    fn split_boundary_edge() {
        let mut mesh = square();
        let e = edge_between(&mesh, 0, 1);
        let v = mesh.split_edge(e, Point3::new(0.5, 0.0, 0.0)).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.face_count(), 3);
        assert!(mesh.is_boundary_vertex(v));
        assert_eq!(mesh.valence(v), 3);
    }

    #[test]
    fn split_inherits_average_attributes() {
        let mut mesh = square();
        mesh.attributes_mut(VertexId::new(0)).target_length = 1.0;
        mesh.attributes_mut(VertexId::new(2)).target_length = 3.0;
        let e = edge_between(&mesh, 0, 2);
        mesh.set_feature_edge(e, true);
        let v = mesh.split_edge(e, mesh.edge_midpoint(e)).unwrap();
        assert_relative_eq!(mesh.attributes(v).target_length, 2.0);
        assert!(mesh.attributes(v).feature);
        let features = mesh
            .outgoing(v)
            .filter(|h| mesh.is_feature_edge(h.edge()))
            .count();
        assert_eq!(features, 2);
    }

    #[test]
    fn flip_square_diagonal() {
        let mut mesh = square();
        let e = edge_between(&mesh, 0, 2);
        mesh.flip_edge(e).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.find_halfedge(VertexId::new(1), VertexId::new(3)).is_some());
        assert!(mesh.find_halfedge(VertexId::new(0), VertexId::new(2)).is_none());
        for f in mesh.faces() {
            assert!(mesh.face_normal(f).unwrap().z > 0.0);
        }
    }

    #[test]
    fn flip_boundary_is_rejected() {
        let mut mesh = square();
        let e = edge_between(&mesh, 0, 1);
        assert_eq!(mesh.flip_edge(e), Err(Rejection::BoundaryEdge));
        mesh.validate().unwrap();
    }

    #[test]
    fn collapse_interior_edge() {
        let mut mesh = HalfedgeMesh::from_indexed(&primitives::disc(2.0, 2, 8)).unwrap();
        let center = VertexId::new(0);
        let e = edge_between(&mesh, 0, 1);
        mesh.collapse_edge(e, VertexId::new(1)).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_removed_vertex(center));
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.face_count(), 8 + 16 - 2);
    }

    #[test]
    fn collapse_bridge_is_rejected() {
        // Interior edge joining two boundary vertices.
        let mut mesh = square();
        let e = edge_between(&mesh, 0, 2);
        assert!(mesh.collapse_edge(e, VertexId::new(2)).is_err());
        mesh.validate().unwrap();
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn collapse_requires_endpoint() {
        let mut mesh = square();
        let e = edge_between(&mesh, 0, 1);
        assert_eq!(
            mesh.collapse_edge(e, VertexId::new(3)),
            Err(Rejection::NotEndpoint)
        );
    }

    #[test]
    fn collapse_on_tetrahedron_is_rejected() {
        let tetra = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
        );
        let mut mesh = HalfedgeMesh::from_indexed(&tetra).unwrap();
        for e in mesh.edges().collect::<Vec<_>>() {
            let (_, b) = mesh.edge_vertices(e);
            assert!(mesh.collapse_edge(e, b).is_err());
        }
        mesh.validate().unwrap();
    }

    #[test]
    fn removed_handles_are_rejected() {
        let mut mesh = HalfedgeMesh::from_indexed(&primitives::disc(2.0, 2, 8)).unwrap();
        let e = edge_between(&mesh, 0, 1);
        mesh.collapse_edge(e, VertexId::new(1)).unwrap();
        assert_eq!(mesh.collapse_edge(e, VertexId::new(1)), Err(Rejection::Removed));
        assert_eq!(mesh.split_edge(e, Point3::origin()), Err(Rejection::Removed));
        assert_eq!(
            mesh.move_vertex(VertexId::new(0), Point3::origin()),
            Err(Rejection::Removed)
        );
    }
}
