// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Portal roles and route-group role policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Portal roles.
///
/// Roles are flat: there is no hierarchy, an admin does not implicitly pass a
/// faculty gate. Each protected route group names exactly the roles it admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Portal administration (user management, statistics)
    Admin,
    /// Teaching staff (courses, grading, materials)
    Faculty,
    /// Enrolled students
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Faculty, Role::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }
}

/// Returned when a role string is not one of `admin`, `faculty`, `student`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "faculty" => Ok(Role::Faculty),
            "student" => Ok(Role::Student),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of roles admitted to one route group.
///
/// Built once when the router is assembled and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePolicy {
    // Indexed by `Role as usize`.
    allowed: [bool; 3],
}

impl RolePolicy {
    /// Policy admitting exactly one role.
    pub const fn only(role: Role) -> Self {
        let mut allowed = [false; 3];
        allowed[role as usize] = true;
        Self { allowed }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed[role as usize]
    }
}

/// The portal's static policy table: route prefix to admitted roles.
///
/// Every protected route lives under exactly one of these prefixes.
pub const POLICY_GROUPS: [(&str, RolePolicy); 3] = [
    ("/admin", RolePolicy::only(Role::Admin)),
    ("/faculty", RolePolicy::only(Role::Faculty)),
    ("/student", RolePolicy::only(Role::Student)),
];
