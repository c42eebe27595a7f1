//! Fasteners and the joins that place them.

use fabcam_math::{Point3, Tolerance, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{FabError, Result};

/// Thread profile of a fastener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadProfile {
    /// ISO metric coarse pitch.
    IsoCoarse,
    /// ISO metric fine pitch.
    IsoFine,
    /// Unified coarse (UNC).
    UtsCoarse,
    /// Unified fine (UNF).
    UtsFine,
    /// Unified extra fine (UNEF).
    UtsExtraFine,
}

impl ThreadProfile {
    /// Human readable profile name.
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadProfile::IsoCoarse => "ISO Metric Coarse",
            ThreadProfile::IsoFine => "ISO Metric Fine",
            ThreadProfile::UtsCoarse => "UTS Coarse",
            ThreadProfile::UtsFine => "UTS Fine",
            ThreadProfile::UtsExtraFine => "UTS Extra Fine",
        }
    }

    fn is_metric(self) -> bool {
        matches!(self, ThreadProfile::IsoCoarse | ThreadProfile::IsoFine)
    }
}

/// Which diameter a drilled hole uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoleKind {
    /// Tap drill for cutting threads.
    Thread,
    /// Close clearance fit.
    #[default]
    Close,
    /// Loose clearance fit.
    Loose,
}

impl HoleKind {
    /// Lowercase name used in records and hashes.
    pub fn as_str(self) -> &'static str {
        match self {
            HoleKind::Thread => "thread",
            HoleKind::Close => "close",
            HoleKind::Loose => "loose",
        }
    }
}

// Native units: millimeters and pitch for metric rows, inches and threads
// per inch for unified rows.
struct SizeRow {
    size: &'static str,
    metric: bool,
    major: f64,
    close: f64,
    loose: f64,
    coarse: f64,
    fine: f64,
    extra_fine: Option<f64>,
}

const fn metric(size: &'static str, major: f64, close: f64, loose: f64, coarse: f64, fine: f64) -> SizeRow {
    SizeRow {
        size,
        metric: true,
        major,
        close,
        loose,
        coarse,
        fine,
        extra_fine: None,
    }
}

const fn unified(
    size: &'static str,
    major: f64,
    close: f64,
    loose: f64,
    coarse: f64,
    fine: f64,
    extra_fine: Option<f64>,
) -> SizeRow {
    SizeRow {
        size,
        metric: false,
        major,
        close,
        loose,
        coarse,
        fine,
        extra_fine,
    }
}

const SIZES: &[SizeRow] = &[
    metric("M1.6", 1.6, 1.7, 1.8, 0.35, 0.2),
    metric("M2", 2.0, 2.2, 2.4, 0.4, 0.25),
    metric("M2.5", 2.5, 2.7, 2.9, 0.45, 0.35),
    metric("M3", 3.0, 3.2, 3.4, 0.5, 0.35),
    metric("M4", 4.0, 4.3, 4.5, 0.7, 0.5),
    metric("M5", 5.0, 5.3, 5.5, 0.8, 0.5),
    metric("M6", 6.0, 6.4, 6.6, 1.0, 0.75),
    metric("M8", 8.0, 8.4, 9.0, 1.25, 1.0),
    metric("M10", 10.0, 10.5, 11.0, 1.5, 1.25),
    metric("M12", 12.0, 13.0, 13.5, 1.75, 1.25),
    unified("UTS #4", 0.112, 0.116, 0.1285, 40.0, 48.0, None),
    unified("UTS #6", 0.138, 0.144, 0.1495, 32.0, 40.0, None),
    unified("UTS #8", 0.164, 0.1695, 0.177, 32.0, 36.0, None),
    unified("UTS #10", 0.190, 0.196, 0.201, 24.0, 32.0, None),
    unified("UTS 1/4", 0.250, 0.257, 0.266, 20.0, 28.0, Some(32.0)),
];

const MM_PER_INCH: f64 = 25.4;

/// A class of fastener: thread name, profile and nominal size.
#[derive(Debug, Clone, PartialEq)]
pub struct Fasten {
    /// Thread name, e.g. `#4-40` or `M3x0.5`.
    pub name: String,
    /// Thread profile.
    pub profile: ThreadProfile,
    /// Nominal size, e.g. `M3` or `UTS #4`.
    pub size: String,
    close: f64,
    loose: f64,
    thread: f64,
}

impl Fasten {
    /// Look up the drill diameters for `size` under `profile`.
    ///
    /// Fails with `NotFound` for an unknown size and `SchemaViolation` when
    /// the size and profile belong to different thread systems or the size
    /// has no pitch for the profile.
    pub fn new(name: impl Into<String>, profile: ThreadProfile, size: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let size = size.into();
        let row = SIZES
            .iter()
            .find(|row| row.size == size)
            .ok_or_else(|| FabError::not_found("fastener size", &size))?;
        if row.metric != profile.is_metric() {
            return Err(FabError::schema(
                &name,
                "profile",
                format!("{} does not apply to size {size}", profile.as_str()),
            ));
        }
        let pitch = match profile {
            ThreadProfile::IsoCoarse => Some(row.coarse),
            ThreadProfile::IsoFine => Some(row.fine),
            ThreadProfile::UtsCoarse => Some(MM_PER_INCH / row.coarse),
            ThreadProfile::UtsFine => Some(MM_PER_INCH / row.fine),
            ThreadProfile::UtsExtraFine => row.extra_fine.map(|tpi| MM_PER_INCH / tpi),
        }
        .ok_or_else(|| FabError::schema(&name, "profile", format!("size {size} has no extra fine pitch")))?;
        let scale = if row.metric { 1.0 } else { MM_PER_INCH };
        Ok(Self {
            name,
            profile,
            size,
            close: row.close * scale,
            loose: row.loose * scale,
            thread: row.major * scale - pitch,
        })
    }

    /// The thread name.
    pub fn thread_name(&self) -> &str {
        &self.name
    }

    /// Drill diameter in mm for a hole of `kind`.
    pub fn diameter(&self, kind: HoleKind) -> f64 {
        match kind {
            HoleKind::Thread => self.thread,
            HoleKind::Close => self.close,
            HoleKind::Loose => self.loose,
        }
    }
}

/// One fastener placed along a line, head at `start`, tip at `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Fastener class.
    pub fasten: Fasten,
    /// Head end.
    pub start: Point3,
    /// Tip end.
    pub end: Point3,
    /// Diameter to drill where this join crosses a solid.
    pub hole_kind: HoleKind,
}

impl Join {
    /// Place a fastener from `start` to `end` with close-fit holes.
    pub fn new(fasten: Fasten, start: Point3, end: Point3) -> Result<Self> {
        if Tolerance::DEFAULT.points_equal(&start, &end) {
            return Err(FabError::schema(&fasten.name, "end", "coincides with start"));
        }
        Ok(Self {
            fasten,
            start,
            end,
            hole_kind: HoleKind::Close,
        })
    }

    /// Use `kind` holes for this join.
    pub fn with_hole_kind(mut self, kind: HoleKind) -> Self {
        self.hole_kind = kind;
        self
    }

    /// Direction from head to tip.
    pub fn axis(&self) -> Vec3 {
        self.end - self.start
    }
}
