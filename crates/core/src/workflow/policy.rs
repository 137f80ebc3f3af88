use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How many VP signatures a department needs after HR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpRequirement {
    #[default]
    None,
    Single,
    Dual,
}

impl VpRequirement {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "single" => Some(Self::Single),
            "dual" => Some(Self::Dual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Single => "single",
            Self::Dual => "dual",
        }
    }

    pub fn requires_vp(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn requires_both(&self) -> bool {
        matches!(self, Self::Dual)
    }
}

impl FromStr for VpRequirement {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("unknown vp requirement `{value}`"))
    }
}

/// Externally configured lookup of VP sign-off rules per department.
pub trait DepartmentPolicy: Send + Sync {
    fn vp_requirement(&self, department_id: &str) -> VpRequirement;
}

#[derive(Clone, Debug, Default)]
pub struct StaticDepartmentPolicy {
    default: VpRequirement,
    departments: HashMap<String, VpRequirement>,
}

impl StaticDepartmentPolicy {
    pub fn new(default: VpRequirement) -> Self {
        Self { default, departments: HashMap::new() }
    }

    pub fn with_department(
        mut self,
        department_id: impl Into<String>,
        requirement: VpRequirement,
    ) -> Self {
        self.departments.insert(department_id.into(), requirement);
        self
    }
}

impl DepartmentPolicy for StaticDepartmentPolicy {
    fn vp_requirement(&self, department_id: &str) -> VpRequirement {
        self.departments.get(department_id).copied().unwrap_or(self.default)
    }
}

impl<P: DepartmentPolicy + ?Sized> DepartmentPolicy for &P {
    fn vp_requirement(&self, department_id: &str) -> VpRequirement {
        (**self).vp_requirement(department_id)
    }
}
