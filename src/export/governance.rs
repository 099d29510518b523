//! Governance validation: the Export Coordinator's first step.
//! Synchronous, no side effects -- runs before any rendering resource is
//! allocated.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectLicense {
    pub requires_watermark: bool,
    pub max_export_resolution: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserPlan {
    pub max_resolution: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatermarkSpec {
    pub asset_id: String,
    pub opacity: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Governance {
    #[serde(default)]
    pub project_license: Option<ProjectLicense>,
    #[serde(default)]
    pub user_plan: Option<UserPlan>,
    #[serde(default)]
    pub watermark_spec: Option<WatermarkSpec>,
}

#[derive(Clone, Copy, Debug)]
pub struct QualityProfile {
    pub width: u32,
    pub height: u32,
}

/// `WatermarkRequired` if the license demands a watermark and none is given;
/// `ResolutionNotAllowed` if `quality.height` exceeds
/// `min(user_plan.max_resolution, license.max_export_resolution)` (over
/// whichever of the two bounds are present).
pub fn validate_governance(governance: &Governance, quality: &QualityProfile) -> ExportResult<()> {
    if let Some(license) = &governance.project_license {
        if license.requires_watermark && governance.watermark_spec.is_none() {
            return Err(ExportError::WatermarkRequired);
        }
    }

    let max_allowed = match (
        governance.user_plan.as_ref().map(|p| p.max_resolution),
        governance.project_license.as_ref().map(|l| l.max_export_resolution),
    ) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    if let Some(max_allowed) = max_allowed {
        if quality.height > max_allowed {
            return Err(ExportError::ResolutionNotAllowed { requested: quality.height, max_allowed });
        }
    }

    Ok(())
}
