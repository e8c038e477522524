//! Entity resolution for imported rows
//!
//! Customers and branches are looked up by an ordered list of strategies
//! (exact code, then partial name). The first strategy that yields exactly
//! one record wins. A name that matches several records is ambiguous and
//! never picks a winner. Operators are best-effort and never fail a row.
//!
//! "Not found" is a `Resolution` value. Only store failures are `Err`.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::record_store::{RecordStore, StoreError};
use crate::types::{EntityRef, ResolvedEntities, TenantScope, ValidatedRow};

/// Name lookups fetch this many rows: enough to tell one match from several.
const NAME_MATCH_LIMIT: i64 = 2;

/// Outcome of a single lookup strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Strategy not applicable (its input field is blank)
    Skipped,
    NotFound,
    Ambiguous,
    Found(EntityRef),
}

impl Lookup {
    fn from_matches(mut matches: Vec<EntityRef>) -> Self {
        match matches.len() {
            0 => Self::NotFound,
            1 => Self::Found(matches.remove(0)),
            _ => Self::Ambiguous,
        }
    }
}

/// Result of running a strategy list
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    Found(EntityRef),
    /// Nothing resolved; `ambiguous` is set if some strategy saw several matches
    Unresolved { ambiguous: bool },
}

/// Ways to find a customer within a company, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerStrategy {
    ExactCode,
    PartialName,
}

pub const CUSTOMER_STRATEGIES: &[CustomerStrategy] = &[CustomerStrategy::ExactCode, CustomerStrategy::PartialName];

/// Ways to find a branch within a customer, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStrategy {
    ExactCode,
    PartialName,
}

pub const BRANCH_STRATEGIES: &[BranchStrategy] = &[BranchStrategy::ExactCode, BranchStrategy::PartialName];

fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CustomerStrategy {
    pub async fn lookup(
        self,
        store: &dyn RecordStore,
        company_id: Uuid,
        row: &ValidatedRow,
    ) -> Result<Lookup, StoreError> {
        match self {
            Self::ExactCode => {
                let Some(code) = field(&row.row.customer_code) else {
                    return Ok(Lookup::Skipped);
                };
                let found = store.find_customer_by_code(company_id, code).await?;
                Ok(found.map_or(Lookup::NotFound, Lookup::Found))
            }
            Self::PartialName => {
                let Some(name) = field(&row.row.customer_name) else {
                    return Ok(Lookup::Skipped);
                };
                let matches = store.find_customers_by_name(company_id, name, NAME_MATCH_LIMIT).await?;
                Ok(Lookup::from_matches(matches))
            }
        }
    }
}

impl BranchStrategy {
    pub async fn lookup(
        self,
        store: &dyn RecordStore,
        customer_id: Uuid,
        row: &ValidatedRow,
    ) -> Result<Lookup, StoreError> {
        match self {
            Self::ExactCode => {
                let Some(code) = field(&row.row.branch_code) else {
                    return Ok(Lookup::Skipped);
                };
                let found = store.find_branch_by_code(customer_id, code).await?;
                Ok(found.map_or(Lookup::NotFound, Lookup::Found))
            }
            Self::PartialName => {
                let Some(name) = field(&row.row.branch_name) else {
                    return Ok(Lookup::Skipped);
                };
                let matches = store.find_branches_by_name(customer_id, name, NAME_MATCH_LIMIT).await?;
                Ok(Lookup::from_matches(matches))
            }
        }
    }
}

/// Fold lookup outcomes in strategy order: first `Found` wins.
fn first_found(outcomes: &mut Vec<Lookup>) -> Match {
    let ambiguous = outcomes.iter().any(|l| *l == Lookup::Ambiguous);
    match outcomes.drain(..).find_map(|l| match l {
        Lookup::Found(entity) => Some(entity),
        _ => None,
    }) {
        Some(entity) => Match::Found(entity),
        None => Match::Unresolved { ambiguous },
    }
}

pub async fn resolve_customer(
    store: &dyn RecordStore,
    scope: &TenantScope,
    row: &ValidatedRow,
) -> Result<Match, StoreError> {
    let mut outcomes = Vec::with_capacity(CUSTOMER_STRATEGIES.len());
    for strategy in CUSTOMER_STRATEGIES {
        let outcome = strategy.lookup(store, scope.company_id, row).await?;
        let hit = matches!(outcome, Lookup::Found(_));
        outcomes.push(outcome);
        if hit {
            break;
        }
    }
    Ok(first_found(&mut outcomes))
}

pub async fn resolve_branch(
    store: &dyn RecordStore,
    customer_id: Uuid,
    row: &ValidatedRow,
) -> Result<Match, StoreError> {
    let mut outcomes = Vec::with_capacity(BRANCH_STRATEGIES.len());
    for strategy in BRANCH_STRATEGIES {
        let outcome = strategy.lookup(store, customer_id, row).await?;
        let hit = matches!(outcome, Lookup::Found(_));
        outcomes.push(outcome);
        if hit {
            break;
        }
    }
    Ok(first_found(&mut outcomes))
}

/// Best-effort operator lookup: approved and active, exactly one match.
pub async fn resolve_operator(
    store: &dyn RecordStore,
    scope: &TenantScope,
    row: &ValidatedRow,
) -> Result<Option<Uuid>, StoreError> {
    let Some(name) = field(&row.row.operator) else {
        return Ok(None);
    };

    let matches = store
        .find_active_operators_by_name(scope.company_id, name, NAME_MATCH_LIMIT)
        .await?;

    match Lookup::from_matches(matches) {
        Lookup::Found(operator) => Ok(Some(operator.id)),
        Lookup::Ambiguous => {
            warn!("Row {}: operator '{}' is ambiguous, visit left unassigned", row.row_number, name);
            Ok(None)
        }
        _ => {
            debug!("Row {}: operator '{}' not found, visit left unassigned", row.row_number, name);
            Ok(None)
        }
    }
}

/// Outcome of resolving a row
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedEntities),
    CustomerNotFound {
        code: Option<String>,
        name: Option<String>,
        ambiguous: bool,
    },
    BranchNotFound {
        code: Option<String>,
        name: Option<String>,
        customer_name: String,
        ambiguous: bool,
    },
}

impl Resolution {
    /// User-facing failure message, `None` when resolved
    pub fn failure_message(&self, row_number: usize) -> Option<String> {
        let suffix = |ambiguous: bool| if ambiguous { ", birden fazla eşleşme" } else { "" };
        match self {
            Self::Resolved(_) => None,
            Self::CustomerNotFound { code, name, ambiguous } => Some(format!(
                "Müşteri bulunamadı: {} (kod: {}{}, satır {})",
                name.as_deref().unwrap_or("-"),
                code.as_deref().unwrap_or("-"),
                suffix(*ambiguous),
                row_number,
            )),
            Self::BranchNotFound { code, name, customer_name, ambiguous } => Some(format!(
                "Şube bulunamadı: {} (kod: {}, müşteri: {}{}, satır {})",
                name.as_deref().unwrap_or("-"),
                code.as_deref().unwrap_or("-"),
                customer_name,
                suffix(*ambiguous),
                row_number,
            )),
        }
    }
}

/// Resolve customer, branch and (optionally) operator for a validated row.
pub async fn resolve_row(
    store: &dyn RecordStore,
    scope: &TenantScope,
    row: &ValidatedRow,
) -> Result<Resolution, StoreError> {
    let customer = match resolve_customer(store, scope, row).await? {
        Match::Found(customer) => customer,
        Match::Unresolved { ambiguous } => {
            return Ok(Resolution::CustomerNotFound {
                code: field(&row.row.customer_code).map(str::to_string),
                name: field(&row.row.customer_name).map(str::to_string),
                ambiguous,
            });
        }
    };

    let branch = match resolve_branch(store, customer.id, row).await? {
        Match::Found(branch) => branch,
        Match::Unresolved { ambiguous } => {
            return Ok(Resolution::BranchNotFound {
                code: field(&row.row.branch_code).map(str::to_string),
                name: field(&row.row.branch_name).map(str::to_string),
                customer_name: customer.name,
                ambiguous,
            });
        }
    };

    let operator_id = resolve_operator(store, scope, row).await?;

    Ok(Resolution::Resolved(ResolvedEntities {
        customer_id: customer.id,
        customer_name: customer.name,
        branch_id: branch.id,
        branch_name: branch.name,
        operator_id,
    }))
}
