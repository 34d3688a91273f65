//! Transform Frame (TF) Engine.
//!
//! Maintains a graph of named reference frames and the 3-D rigid-body
//! transforms (translation + quaternion rotation) that relate them.  Given any
//! two frame names the engine composes a chain of transforms via BFS, walking
//! edges forwards or backwards (inverted), to produce the combined
//! [`Transform3D`].
//!
//! [`FrameTransformAdapter`] is the narrow capability the ray marcher
//! consumes: "move this planar point from one frame into another, waiting at
//! most `max_wait`".  [`TfEngine`] implements it without waiting;
//! [`TfBuffer`] is the shareable, thread-safe variant that polls until the
//! deadline so a transform arriving slightly late can still be used.
//!
//! # Example
//!
//! ```rust
//! use umbra_perception::transform::{TfEngine, Transform3D, Vec3, Quaternion};
//!
//! let mut tf = TfEngine::new();
//!
//! // base_link is 1 m forward of odom, same orientation.
//! tf.set_transform("odom", "base_link",
//!     Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()));
//!
//! // the laser is 0.5 m forward of base_link.
//! tf.set_transform("base_link", "base_laser_link",
//!     Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity()));
//!
//! let t = tf.lookup("odom", "base_laser_link").unwrap();
//! assert!((t.translation.x - 1.5).abs() < 1e-5);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use umbra_types::{DetectError, Point2, StampedTransform};

/// Sleep between two lookup attempts inside [`TfBuffer`].
const POLL_INTERVAL: Duration = Duration::from_micros(250);

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// The caller is responsible for providing a unit quaternion.
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Pure rotation of `yaw` radians about +Z.
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Planar pose: translation `(x, y)` and heading `yaw`.
    pub fn planar(x: f32, y: f32, yaw: f32) -> Self {
        Self::new(Vec3::new(x, y, 0.0), Quaternion::from_yaw(yaw))
    }

    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// T_A_B → T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rotation = self.rotation.conjugate();
        Self::new(inv_rotation.rotate(self.translation).neg(), inv_rotation)
    }

    /// Map a point expressed in frame B into frame A.
    pub fn apply(self, v: Vec3) -> Vec3 {
        self.translation.add(self.rotation.rotate(v))
    }

    /// [`apply`][Self::apply] for a point on the z = 0 plane.
    pub fn apply_planar(self, p: Point2) -> Point2 {
        let v = self.apply(Vec3::new(p.x, p.y, 0.0));
        Point2::new(v.x, v.y)
    }
}

impl From<&StampedTransform> for Transform3D {
    fn from(msg: &StampedTransform) -> Self {
        let [x, y, z] = msg.translation;
        let [w, qx, qy, qz] = msg.rotation;
        Self::new(Vec3::new(x, y, z), Quaternion::new(w, qx, qy, qz))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A graph of named reference frames and the [`Transform3D`]s relating them.
///
/// Edges are stored as `parent → child` (the pose of the child in the
/// parent), but [`TfEngine::lookup`] may traverse them in either direction.
#[derive(Debug, Default, Clone)]
pub struct TfEngine {
    /// `edges[parent][child] = T_parent_child`
    edges: HashMap<String, HashMap<String, Transform3D>>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` in `parent_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
    }

    /// Register a transform received from the transform stream.
    pub fn set_stamped(&mut self, msg: &StampedTransform) {
        self.set_transform(&msg.parent_frame, &msg.child_frame, Transform3D::from(msg));
    }

    /// Compute the transform that maps points expressed in `source_frame`
    /// into `target_frame` (i.e. T_target_source).
    ///
    /// Returns `None` if the two frames are not connected.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<Transform3D> {
        if target_frame == source_frame {
            return Some(Transform3D::identity());
        }

        // BFS from the target; each queue item carries T_target_current.
        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((target_frame.to_string(), Transform3D::identity()));
        visited.insert(target_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            for (next, step) in self.neighbours(&current) {
                if visited.contains(&next) {
                    continue;
                }
                let composed = accumulated.compose(step);
                if next == source_frame {
                    return Some(composed);
                }
                visited.insert(next.clone());
                queue.push_back((next, composed));
            }
        }

        None
    }

    /// Every frame adjacent to `frame`, paired with T_frame_neighbour.
    fn neighbours(&self, frame: &str) -> Vec<(String, Transform3D)> {
        let mut out: Vec<(String, Transform3D)> = self
            .edges
            .get(frame)
            .map(|children| children.iter().map(|(c, t)| (c.clone(), *t)).collect())
            .unwrap_or_default();
        for (parent, children) in &self.edges {
            if let Some(t) = children.get(frame) {
                out.push((parent.clone(), t.inverse()));
            }
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameTransformAdapter
// ────────────────────────────────────────────────────────────────────────────

/// Capability to move a planar point between named frames.
///
/// Implementations may block for up to `max_wait`; a missing transform is
/// reported as [`DetectError::TransformUnavailable`].
pub trait FrameTransformAdapter: Send + Sync {
    fn lookup_and_apply(
        &self,
        point: Point2,
        source_frame: &str,
        target_frame: &str,
        max_wait: Duration,
    ) -> Result<Point2, DetectError>;
}

fn unavailable(source_frame: &str, target_frame: &str) -> DetectError {
    DetectError::TransformUnavailable {
        source_frame: source_frame.to_string(),
        target_frame: target_frame.to_string(),
    }
}

impl FrameTransformAdapter for TfEngine {
    /// Immediate lookup; `max_wait` is ignored because the graph cannot
    /// change while it is borrowed.
    fn lookup_and_apply(
        &self,
        point: Point2,
        source_frame: &str,
        target_frame: &str,
        _max_wait: Duration,
    ) -> Result<Point2, DetectError> {
        self.lookup(target_frame, source_frame)
            .map(|t| t.apply_planar(point))
            .ok_or_else(|| unavailable(source_frame, target_frame))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfBuffer
// ────────────────────────────────────────────────────────────────────────────

/// Shared [`TfEngine`] that can be updated from the ingestion side while the
/// detector reads it.  Clone it cheaply – all clones share one graph.
#[derive(Debug, Clone, Default)]
pub struct TfBuffer {
    inner: Arc<RwLock<TfEngine>>,
}

impl TfBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one edge.
    pub fn set_stamped(&self, msg: &StampedTransform) {
        match self.inner.write() {
            Ok(mut tf) => tf.set_stamped(msg),
            Err(poisoned) => poisoned.into_inner().set_stamped(msg),
        }
    }

    /// Non-blocking lookup of T_target_source.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<Transform3D> {
        let tf = match self.inner.read() {
            Ok(tf) => tf,
            Err(poisoned) => poisoned.into_inner(),
        };
        tf.lookup(target_frame, source_frame)
    }
}

impl FrameTransformAdapter for TfBuffer {
    /// Polls the shared graph until the transform exists or `max_wait` has
    /// elapsed.  At least one attempt is always made.
    fn lookup_and_apply(
        &self,
        point: Point2,
        source_frame: &str,
        target_frame: &str,
        max_wait: Duration,
    ) -> Result<Point2, DetectError> {
        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(t) = self.lookup(target_frame, source_frame) {
                return Ok(t.apply_planar(point));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(unavailable(source_frame, target_frame));
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-5, "x should be ~0, got {}", r.x);
        assert!((r.y - 1.0).abs() < 1e-5, "y should be ~1, got {}", r.y);
        assert!(r.z.abs() < 1e-5);
    }

    #[test]
    fn from_yaw_matches_explicit_quaternion() {
        let q = Quaternion::from_yaw(FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((q.z - FRAC_1_SQRT_2).abs() < 1e-6);
    }

    // ── Transform3D ─────────────────────────────────────────────────────────

    #[test]
    fn compose_translations_add() {
        let t1 = Transform3D::planar(1.0, 0.0, 0.0);
        let t2 = Transform3D::planar(2.0, 0.0, 0.0);
        assert!((t1.compose(t2).translation.x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn inverse_undoes_transform() {
        let t = Transform3D::planar(1.0, -2.0, 0.7);
        let p = Point2::new(0.3, 0.4);
        let back = t.inverse().apply_planar(t.apply_planar(p));
        assert!((back.x - p.x).abs() < 1e-5);
        assert!((back.y - p.y).abs() < 1e-5);
    }

    #[test]
    fn apply_planar_rotates_then_translates() {
        let t = Transform3D::planar(1.0, 1.0, FRAC_PI_2);
        let p = t.apply_planar(Point2::new(1.0, 0.0));
        assert!((p.x - 1.0).abs() < 1e-5, "x={}", p.x);
        assert!((p.y - 2.0).abs() < 1e-5, "y={}", p.y);
    }

    // ── TfEngine ────────────────────────────────────────────────────────────

    #[test]
    fn lookup_same_frame_returns_identity() {
        let tf = TfEngine::new();
        assert_eq!(tf.lookup("odom", "odom"), Some(Transform3D::identity()));
    }

    #[test]
    fn lookup_composed_chain() {
        let mut tf = TfEngine::new();
        tf.set_transform("odom", "base_link", Transform3D::planar(1.0, 0.0, 0.0));
        tf.set_transform("base_link", "base_laser_link", Transform3D::planar(0.5, 0.0, 0.0));

        let t = tf.lookup("odom", "base_laser_link").unwrap();
        assert!((t.translation.x - 1.5).abs() < 1e-5);
    }

    #[test]
    fn lookup_walks_edges_backwards() {
        let mut tf = TfEngine::new();
        tf.set_transform("odom", "base_link", Transform3D::planar(2.0, 0.0, 0.0));

        let t = tf.lookup("base_link", "odom").unwrap();
        assert!((t.translation.x + 2.0).abs() < 1e-5);
    }

    #[test]
    fn lookup_through_common_parent() {
        // map → odom and map → marker: odom-to-marker needs one backward hop.
        let mut tf = TfEngine::new();
        tf.set_transform("map", "odom", Transform3D::planar(1.0, 0.0, 0.0));
        tf.set_transform("map", "marker", Transform3D::planar(0.0, 3.0, 0.0));

        let p = tf.lookup("odom", "marker").unwrap().apply_planar(Point2::origin());
        assert!((p.x + 1.0).abs() < 1e-5);
        assert!((p.y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn lookup_disconnected_returns_none() {
        let mut tf = TfEngine::new();
        tf.set_transform("odom", "base_link", Transform3D::identity());
        assert!(tf.lookup("odom", "ghost_frame").is_none());
    }

    #[test]
    fn lookup_respects_rotation_in_chain() {
        let mut tf = TfEngine::new();
        tf.set_transform("odom", "base_link", Transform3D::planar(0.0, 0.0, FRAC_PI_2));
        tf.set_transform("base_link", "base_laser_link", Transform3D::planar(1.0, 0.0, 0.0));

        let t = tf.lookup("odom", "base_laser_link").unwrap();
        assert!(t.translation.x.abs() < 1e-5, "x={}", t.translation.x);
        assert!((t.translation.y - 1.0).abs() < 1e-5, "y={}", t.translation.y);
    }

    #[test]
    fn set_stamped_overrides_previous() {
        let mut tf = TfEngine::new();
        tf.set_stamped(&StampedTransform::planar("odom", "base_laser_link", 1.0, 0.0, 0.0));
        tf.set_stamped(&StampedTransform::planar("odom", "base_laser_link", 5.0, 0.0, 0.0));
        let t = tf.lookup("odom", "base_laser_link").unwrap();
        assert!((t.translation.x - 5.0).abs() < 1e-5);
    }

    // ── Adapters ────────────────────────────────────────────────────────────

    #[test]
    fn engine_adapter_reports_missing_transform() {
        let tf = TfEngine::new();
        let err = tf
            .lookup_and_apply(Point2::origin(), "base_laser_link", "odom", Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, DetectError::TransformUnavailable { .. }));
    }

    #[test]
    fn buffer_times_out_without_transform() {
        let buffer = TfBuffer::new();
        let started = Instant::now();
        let result = buffer.lookup_and_apply(
            Point2::origin(),
            "base_laser_link",
            "odom",
            Duration::from_millis(5),
        );
        assert!(result.is_err());
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn buffer_sees_transform_published_while_waiting() {
        let buffer = TfBuffer::new();
        let writer = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            writer.set_stamped(&StampedTransform::planar("odom", "base_laser_link", 1.0, 2.0, 0.0));
        });

        let p = buffer
            .lookup_and_apply(
                Point2::new(0.5, 0.0),
                "base_laser_link",
                "odom",
                Duration::from_secs(2),
            )
            .expect("transform should arrive before the deadline");
        handle.join().unwrap();
        assert!((p.x - 1.5).abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-5);
    }
}
