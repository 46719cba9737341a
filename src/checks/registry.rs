use std::collections::{BTreeSet, HashMap};

use super::flags::{Flag, FlagValues};
use super::inline::{self, BrokenLink, LinkDefect, ParentTableInvalid, WithoutParentId};
use super::pages::{BrokenTree, DeletedAncestor, NegativePid};
use super::records::{DeletedOnMissingPages, OnDeletedPages, OnMissingPages, RootLevelViolation};
use super::translations::{
    self, BadParent, Duplicates, ParentDefect, ParentDifferentPid, Scope, UntranslatedWithParent,
};
use super::workspaces::{
    LiveRecordsWithOrigin, OriginDefect, OverlaysWithBadOrigin, OverlaysWithoutLiveRecord,
    RecordsOfDeletedWorkspaces, RecordsWithoutWorkspaces, SoftDeletedOverlays,
};
use super::Check;
use crate::integrity_errors::IntegrityErrorCode;
use crate::AppResult;

/// Every check in execution order.
pub fn catalogue() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(FlagValues::new(Flag::SoftDelete)),
        Box::new(FlagValues::new(Flag::Hidden)),
        Box::new(RecordsWithoutWorkspaces),
        Box::new(RecordsOfDeletedWorkspaces),
        Box::new(SoftDeletedOverlays),
        Box::new(LiveRecordsWithOrigin),
        Box::new(OverlaysWithoutLiveRecord),
        Box::new(OverlaysWithBadOrigin::new(OriginDefect::Deleted)),
        Box::new(OverlaysWithBadOrigin::new(OriginDefect::IsOverlay)),
        Box::new(OverlaysWithBadOrigin::new(OriginDefect::LanguageMismatch)),
        Box::new(NegativePid),
        Box::new(BrokenTree),
        Box::new(UntranslatedWithParent::default_language()),
        Box::new(UntranslatedWithParent::all_languages()),
        Box::new(translations::ParentMissing::new(Scope::Pages)),
        Box::new(BadParent::new(Scope::Pages, ParentDefect::Deleted)),
        Box::new(BadParent::new(Scope::Pages, ParentDefect::IsTranslation)),
        Box::new(ParentDifferentPid::new(Scope::Pages)),
        Box::new(DeletedAncestor),
        Box::new(OnMissingPages),
        Box::new(DeletedOnMissingPages),
        Box::new(OnDeletedPages),
        Box::new(RootLevelViolation::on_root()),
        Box::new(RootLevelViolation::off_root()),
        Box::new(translations::ParentMissing::new(Scope::Records)),
        Box::new(BadParent::new(Scope::Records, ParentDefect::Deleted)),
        Box::new(BadParent::new(Scope::Records, ParentDefect::IsTranslation)),
        Box::new(ParentDifferentPid::new(Scope::Records)),
        Box::new(Duplicates),
        Box::new(ParentTableInvalid),
        Box::new(WithoutParentId),
        Box::new(inline::ParentMissing),
        Box::new(BrokenLink::new(LinkDefect::ParentDeleted)),
        Box::new(BrokenLink::new(LinkDefect::DifferentPid)),
        Box::new(BrokenLink::new(LinkDefect::LanguageMismatch)),
        Box::new(BrokenLink::new(LinkDefect::WorkspaceMismatch)),
    ]
}

/// Ordered, validated set of checks.
pub struct CheckRegistry {
    checks: Vec<Box<dyn Check>>,
}

impl CheckRegistry {
    /// Accepts `checks` only if ids are unique and every requirement runs earlier.
    pub fn new(checks: Vec<Box<dyn Check>>) -> AppResult<Self> {
        let mut position: HashMap<&'static str, usize> = HashMap::new();
        for (idx, check) in checks.iter().enumerate() {
            if position.insert(check.id(), idx).is_some() {
                return Err(IntegrityErrorCode::InvalidCheckOrder
                    .into_error()
                    .with_context("check", check.id())
                    .with_context("reason", "duplicate id"));
            }
        }
        for (idx, check) in checks.iter().enumerate() {
            for required in check.requires() {
                match position.get(required) {
                    Some(at) if *at < idx => {}
                    Some(_) => {
                        return Err(IntegrityErrorCode::InvalidCheckOrder
                            .into_error()
                            .with_context("check", check.id())
                            .with_context("requires", *required)
                            .with_context("reason", "requirement runs later"));
                    }
                    None => {
                        return Err(IntegrityErrorCode::UnknownCheck
                            .into_error()
                            .with_context("check", check.id())
                            .with_context("requires", *required));
                    }
                }
            }
        }
        Ok(Self { checks })
    }

    pub fn standard() -> AppResult<Self> {
        Self::new(catalogue())
    }

    pub fn checks(&self) -> impl Iterator<Item = &dyn Check> {
        self.checks.iter().map(|check| check.as_ref())
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Check> {
        self.checks().find(|check| check.id() == id)
    }

    /// The named checks plus everything they transitively require, in
    /// catalogue order. An empty selection means all checks.
    pub fn select(&self, only: &[String]) -> AppResult<Vec<&dyn Check>> {
        if only.is_empty() {
            return Ok(self.checks().collect());
        }
        let mut wanted: BTreeSet<&str> = BTreeSet::new();
        let mut pending: Vec<&str> = Vec::new();
        for id in only {
            let check = self.get(id).ok_or_else(|| {
                IntegrityErrorCode::UnknownCheck
                    .into_error()
                    .with_context("check", id.as_str())
            })?;
            pending.push(check.id());
        }
        while let Some(id) = pending.pop() {
            if !wanted.insert(id) {
                continue;
            }
            if let Some(check) = self.get(id) {
                pending.extend(check.requires().iter().copied());
            }
        }
        Ok(self
            .checks()
            .filter(|check| wanted.contains(check.id()))
            .collect())
    }
}
