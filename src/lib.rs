//! curproxy - CUR schema proxy views for billing dashboards
//!
//! Dashboards are written against one AWS Cost and Usage Report schema
//! generation. This crate compiles a `cur{N}_proxy` view that re-exposes a
//! CUR table of either generation under the layout a dashboard expects:
//! - A static, versioned field equivalence table (flat V1 columns vs V2 maps)
//! - NULL substitution for source columns that don't exist
//! - Additive recompilation that never drops an exposed field or map key
//! - Map assembly that stays under the engine's array literal ceiling

pub mod config;
pub mod cur_schema;
pub mod proxy;
