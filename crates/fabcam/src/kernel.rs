//! The seam to the solid-modeling kernel.
//!
//! Production hands each operation's resolved geometry to a
//! [`GeometryKernel`] and keeps only the opaque [`KernelOutput`] it returns.
//! Nothing the kernel returns ever feeds a content hash.

use fabcam_math::{Plane, Point3, Tolerance};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Geometry;
use crate::settings::ProductionSettings;

/// Opaque reference to a kernel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelHandle(pub u64);

/// What the kernel produced for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelOutput {
    /// The resulting solid or shape binder.
    pub body: KernelHandle,
    /// Profile cut path, for a contoured extrude.
    pub contour_path: Option<KernelHandle>,
    /// Machined floor, for a pocket.
    pub bottom_path: Option<KernelHandle>,
}

/// The kernel rejected its input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct KernelError(pub String);

/// Geometry kernel used during production.
///
/// Every call receives the mount plane; depths are measured from that plane
/// against its normal.
pub trait GeometryKernel: Send {
    /// Extrude `boundary` by `depth`, cutting each `through` profile all the
    /// way through.
    fn extrude(
        &mut self,
        plane: &Plane,
        boundary: &Geometry,
        through: &[Geometry],
        depth: f64,
        contour: bool,
    ) -> Result<KernelOutput, KernelError>;

    /// Remove material inside `boundary` down to `depth`, leaving `islands`.
    fn pocket(
        &mut self,
        plane: &Plane,
        boundary: &Geometry,
        islands: &[Geometry],
        depth: f64,
    ) -> Result<KernelOutput, KernelError>;

    /// Drill one hole of `diameter` and `depth` at each of `centers`.
    fn drill(
        &mut self,
        plane: &Plane,
        diameter: f64,
        depth: f64,
        centers: &[Point3],
    ) -> Result<KernelOutput, KernelError>;
}

/// One call seen by [`MockKernel`].
#[derive(Debug, Clone, PartialEq)]
pub enum KernelCall {
    /// An extrude.
    Extrude {
        /// Depth passed in.
        depth: f64,
        /// Number of through profiles.
        through: usize,
        /// Whether a contour was requested.
        contour: bool,
    },
    /// A pocket.
    Pocket {
        /// Depth passed in.
        depth: f64,
        /// Number of islands.
        islands: usize,
    },
    /// A drilling pass.
    Drill {
        /// Hole diameter.
        diameter: f64,
        /// Hole depth.
        depth: f64,
        /// Number of holes.
        centers: usize,
    },
}

/// Deterministic kernel that validates its input and hands out sequential
/// handles without building any solids.
#[derive(Debug, Clone, Default)]
pub struct MockKernel {
    tolerance: Tolerance,
    next_handle: u64,
    calls: Vec<KernelCall>,
}

impl MockKernel {
    /// A mock kernel using `tolerance` for its input checks.
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            next_handle: 0,
            calls: Vec::new(),
        }
    }

    /// A mock kernel checking its input against the run's tolerances.
    pub fn from_settings(settings: &ProductionSettings) -> Self {
        Self::new(settings.tolerance())
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> &[KernelCall] {
        &self.calls
    }

    fn handle(&mut self) -> KernelHandle {
        self.next_handle += 1;
        KernelHandle(self.next_handle)
    }

    fn check_depth(&self, depth: f64) -> Result<(), KernelError> {
        if depth.is_finite() && depth > self.tolerance.linear {
            Ok(())
        } else {
            Err(KernelError(format!("depth {depth} must be positive")))
        }
    }

    fn check_profiles(&self, boundary: &Geometry, inner: &[Geometry]) -> Result<(), KernelError> {
        boundary.validate(&self.tolerance).map_err(KernelError)?;
        for geometry in inner {
            geometry.validate(&self.tolerance).map_err(KernelError)?;
        }
        Ok(())
    }
}

impl GeometryKernel for MockKernel {
    fn extrude(
        &mut self,
        _plane: &Plane,
        boundary: &Geometry,
        through: &[Geometry],
        depth: f64,
        contour: bool,
    ) -> Result<KernelOutput, KernelError> {
        self.check_depth(depth)?;
        self.check_profiles(boundary, through)?;
        self.calls.push(KernelCall::Extrude {
            depth,
            through: through.len(),
            contour,
        });
        let body = self.handle();
        let contour_path = contour.then(|| self.handle());
        Ok(KernelOutput {
            body,
            contour_path,
            bottom_path: None,
        })
    }

    fn pocket(
        &mut self,
        _plane: &Plane,
        boundary: &Geometry,
        islands: &[Geometry],
        depth: f64,
    ) -> Result<KernelOutput, KernelError> {
        self.check_depth(depth)?;
        self.check_profiles(boundary, islands)?;
        self.calls.push(KernelCall::Pocket {
            depth,
            islands: islands.len(),
        });
        let body = self.handle();
        let bottom_path = Some(self.handle());
        Ok(KernelOutput {
            body,
            contour_path: None,
            bottom_path,
        })
    }

    fn drill(
        &mut self,
        _plane: &Plane,
        diameter: f64,
        depth: f64,
        centers: &[Point3],
    ) -> Result<KernelOutput, KernelError> {
        self.check_depth(depth)?;
        if !(diameter.is_finite() && diameter > self.tolerance.linear) {
            return Err(KernelError(format!("hole diameter {diameter} must be positive")));
        }
        if centers.is_empty() {
            return Err(KernelError("no hole centers".to_string()));
        }
        self.calls.push(KernelCall::Drill {
            diameter,
            depth,
            centers: centers.len(),
        });
        Ok(KernelOutput {
            body: self.handle(),
            contour_path: None,
            bottom_path: None,
        })
    }
}
