//! Reconciliation of researcher publication exports against a Qualis
//! reference list, with weighted scoring and per-researcher / per-group
//! aggregation.

pub mod aggregate;
pub mod catalog;
pub mod common;
pub mod error;
pub mod groups;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod reference;
pub mod scoring;

pub use error::{PipelineError, Result};

/// Canonical column holding the researcher display name.
pub const RESEARCHER_COL: &str = "pesquisador";
/// Canonical integer publication year column.
pub const YEAR_COL: &str = "ano_publicacao";
/// Canonical quality tier column.
pub const TIER_COL: &str = "qualis";
/// Canonical title column.
pub const TITLE_COL: &str = "titulo";
/// Canonical raw ISSN column.
pub const ISSN_COL: &str = "issn";
/// Derived comparison key added to accepted records.
pub const ISSN_CLEAN_COL: &str = "issn_clean";
/// Origin tag added when several programs are reconciled together.
pub const ORIGIN_COL: &str = "programa_origem";
/// Group attribution column produced by group resolution.
pub const GROUP_COL: &str = "linha_pesquisa";
/// Uppercased tier used for scoring.
pub const TIER_NORM_COL: &str = "qualis_norm";
/// Numeric weight attached by scoring.
pub const SCORE_COL: &str = "peso";
