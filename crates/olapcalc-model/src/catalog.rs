//! Metadata catalog trait

use olapcalc_ast::Exp;
use olapcalc_diagnostics::{Diagnostic, ErrorCode, OLAP0400, OLAP0401, OLAP0402, OLAP0501};
use olapcalc_types::{DimensionId, HierarchyId, LevelId, Member};
use serde::Serialize;

/// Hierarchy metadata
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyInfo {
    pub id: HierarchyId,
    pub name: String,
    pub unique_name: String,
    pub dimension: DimensionId,
    pub levels: Vec<LevelId>,
    pub is_measures: bool,
}

/// Level metadata
#[derive(Debug, Clone, Serialize)]
pub struct LevelInfo {
    pub id: LevelId,
    pub name: String,
    pub unique_name: String,
    pub hierarchy: HierarchyId,
    pub depth: u32,
}

/// Dimension metadata
#[derive(Debug, Clone, Serialize)]
pub struct DimensionInfo {
    pub id: DimensionId,
    pub name: String,
    pub hierarchies: Vec<HierarchyId>,
}

/// Result of a name lookup
#[derive(Debug, Clone)]
pub enum Element {
    Member(Member),
    Level(LevelId),
    Hierarchy(HierarchyId),
    Dimension(DimensionId),
}

/// Definition of a calculated member
#[derive(Debug, Clone)]
pub struct CalculatedFormula {
    pub member: Member,
    pub formula: Exp,
}

/// Read-only metadata lookup service.
///
/// Hierarchy ids are dense, `0..hierarchies().len()`. Member navigation
/// never returns calculated members except through [`Catalog::lookup`] and
/// [`Catalog::measures`].
pub trait Catalog: Send + Sync {
    fn cube_name(&self) -> &str;

    fn dimensions(&self) -> &[DimensionInfo];

    fn hierarchies(&self) -> &[HierarchyInfo];

    fn level(&self, id: LevelId) -> Option<&LevelInfo>;

    fn hierarchy(&self, id: HierarchyId) -> Option<&HierarchyInfo> {
        self.hierarchies().get(id.index())
    }

    fn dimension(&self, id: DimensionId) -> Option<&DimensionInfo> {
        self.dimensions().get(id.0 as usize)
    }

    /// The hierarchy holding the measures
    fn measures_hierarchy(&self) -> HierarchyId;

    /// Resolve a compound name to a catalog element
    fn lookup(&self, segments: &[String]) -> Option<Element>;

    fn children(&self, member: &Member) -> Vec<Member>;

    fn parent(&self, member: &Member) -> Option<Member> {
        member.parent().cloned()
    }

    /// Members sharing the parent of `member`, including itself
    fn siblings(&self, member: &Member) -> Vec<Member> {
        match member.parent() {
            Some(parent) => self.children(parent),
            None => self.root_members(member.hierarchy()),
        }
    }

    fn level_members(&self, level: LevelId) -> Vec<Member>;

    /// Top-level members: the All member if the hierarchy has one,
    /// otherwise the members of the first level
    fn root_members(&self, hierarchy: HierarchyId) -> Vec<Member>;

    fn all_member(&self, hierarchy: HierarchyId) -> Option<Member>;

    fn has_all(&self, hierarchy: HierarchyId) -> bool {
        self.all_member(hierarchy).is_some()
    }

    /// The member a hierarchy takes when nothing else fixes it
    fn default_member(&self, hierarchy: HierarchyId) -> Option<Member> {
        self.all_member(hierarchy)
            .or_else(|| self.root_members(hierarchy).into_iter().next())
    }

    /// Members of one level between `from` and `to`, inclusive
    fn member_range(&self, from: &Member, to: &Member) -> Result<Vec<Member>, ModelError> {
        if from.level() != to.level() {
            return Err(ModelError::InvalidRange {
                from: from.unique_name().to_string(),
                to: to.unique_name().to_string(),
            });
        }
        let (lo, hi) = if from.ordinal() <= to.ordinal() {
            (from.ordinal(), to.ordinal())
        } else {
            (to.ordinal(), from.ordinal())
        };
        Ok(self
            .level_members(from.level())
            .into_iter()
            .filter(|m| (lo..=hi).contains(&m.ordinal()))
            .collect())
    }

    /// All measures, stored and calculated
    fn measures(&self) -> Vec<Member>;

    /// Formula of a calculated member
    fn formula(&self, member: &Member) -> Option<&CalculatedFormula>;
}

/// Catalog and schema errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Members {from} and {to} are not on the same level")]
    InvalidRange { from: String, to: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl ModelError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSchema(_) | Self::ParseError(_) => OLAP0400,
            Self::MemberNotFound(_) => OLAP0401,
            Self::InvalidRange { .. } => OLAP0402,
            Self::IoError(_) => OLAP0501,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string())
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
