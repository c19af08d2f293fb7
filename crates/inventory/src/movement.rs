//! Movements: the unit of work applied to the ledger.
//!
//! Each kind carries only the fields it needs. Shape problems (empty lines,
//! non-positive quantities, a decrease without lots) are rejected when the
//! movement is built, before it ever reaches the planner.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_core::{ArticleId, CurrencyCode, DepotId, DomainError, DomainResult, LotId, MovementId};

use crate::error::{InventoryError, MovementRejection};
use crate::quantity::Quantity;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Entry,
    Transfer,
    Exit,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "entry",
            MovementType::Transfer => "transfer",
            MovementType::Exit => "exit",
            MovementType::Adjustment => "adjustment",
        }
    }
}

/// `Draft → Validated → Applied`, or `Rejected` from either of the first two.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Draft,
    Validated,
    Applied,
    Rejected,
}

impl MovementStatus {
    pub fn transition(self, next: MovementStatus) -> DomainResult<MovementStatus> {
        use MovementStatus::*;
        match (self, next) {
            (Draft, Validated) | (Validated, Applied) | (Draft, Rejected) | (Validated, Rejected) => {
                Ok(next)
            }
            (from, to) => Err(DomainError::invariant(format!(
                "movement cannot go from {from:?} to {to:?}"
            ))),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, MovementStatus::Applied | MovementStatus::Rejected)
    }
}

/// Quantity drawn from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSelection {
    pub lot_id: LotId,
    pub quantity_kg: Decimal,
}

impl LotSelection {
    pub fn new(lot_id: LotId, quantity_kg: Decimal) -> Self {
        Self { lot_id, quantity_kg }
    }
}

/// How lots are picked for a transfer line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LotAllocation {
    /// Oldest lots first.
    #[default]
    Fifo,
    Explicit { lots: Vec<LotSelection> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    pub article_id: ArticleId,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    /// Defaults to the article's reference cost currency.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub quarantined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub article_id: ArticleId,
    pub quantity: Quantity,
    #[serde(default)]
    pub allocation: LotAllocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitLine {
    pub article_id: ArticleId,
    pub quantity_kg: Decimal,
    #[serde(default)]
    pub lots: Vec<LotSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum AdjustmentDelta {
    /// Reconciliation gain; behaves like a single-line entry.
    Increase {
        quantity: Quantity,
        unit_cost: Decimal,
        #[serde(default)]
        currency: Option<CurrencyCode>,
        #[serde(default)]
        batch_number: Option<String>,
    },
    Decrease {
        quantity_kg: Decimal,
        #[serde(default)]
        lots: Vec<LotSelection>,
    },
    /// Moves stock out of (`> 0`) or into (`< 0`) quarantine; total unchanged.
    Commercialisable { delta_kg: Decimal },
}

impl AdjustmentDelta {
    /// Build a delta from a signed kg amount, the way manual adjustments are entered.
    pub fn from_signed(
        depot_id: DepotId,
        article_id: ArticleId,
        delta_kg: Decimal,
        lots: Option<Vec<LotSelection>>,
        unit_cost: Option<Decimal>,
        currency: Option<CurrencyCode>,
    ) -> Result<Self, InventoryError> {
        if delta_kg.is_zero() {
            return Err(InventoryError::validation("delta_kg", "delta cannot be zero"));
        }
        if delta_kg > Decimal::ZERO {
            let unit_cost = unit_cost.ok_or_else(|| {
                InventoryError::validation("unit_cost", "an increase requires a unit cost")
            })?;
            return Ok(AdjustmentDelta::Increase {
                quantity: Quantity::Kg(delta_kg),
                unit_cost,
                currency,
                batch_number: None,
            });
        }

        let quantity_kg = -delta_kg;
        match lots {
            Some(lots) if !lots.is_empty() => Ok(AdjustmentDelta::Decrease { quantity_kg, lots }),
            _ => Err(InventoryError::MissingLotSelection {
                article_id,
                depot_id,
                quantity_kg,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementKind {
    Entry {
        depot_id: DepotId,
        lines: Vec<EntryLine>,
    },
    Transfer {
        source_depot: DepotId,
        destination_depot: DepotId,
        lines: Vec<TransferLine>,
    },
    Exit {
        depot_id: DepotId,
        lines: Vec<ExitLine>,
    },
    Adjustment {
        depot_id: DepotId,
        article_id: ArticleId,
        delta: AdjustmentDelta,
    },
}

impl MovementKind {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementKind::Entry { .. } => MovementType::Entry,
            MovementKind::Transfer { .. } => MovementType::Transfer,
            MovementKind::Exit { .. } => MovementType::Exit,
            MovementKind::Adjustment { .. } => MovementType::Adjustment,
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            MovementKind::Entry { lines, .. } => lines.len(),
            MovementKind::Transfer { lines, .. } => lines.len(),
            MovementKind::Exit { lines, .. } => lines.len(),
            MovementKind::Adjustment { .. } => 1,
        }
    }

    pub fn depots(&self) -> Vec<DepotId> {
        match self {
            MovementKind::Entry { depot_id, .. }
            | MovementKind::Exit { depot_id, .. }
            | MovementKind::Adjustment { depot_id, .. } => vec![*depot_id],
            MovementKind::Transfer {
                source_depot,
                destination_depot,
                ..
            } => vec![*source_depot, *destination_depot],
        }
    }

    fn shape_errors(&self) -> Vec<InventoryError> {
        let mut errors = Vec::new();

        if self.line_count() == 0 {
            errors.push(InventoryError::validation("lines", "a movement needs at least one line"));
        }

        match self {
            MovementKind::Entry { lines, .. } => {
                for (i, line) in lines.iter().enumerate() {
                    check_positive_quantity(&mut errors, i, &line.quantity);
                    check_unit_cost(&mut errors, i, line.unit_cost);
                }
            }
            MovementKind::Transfer {
                source_depot,
                destination_depot,
                lines,
            } => {
                if source_depot == destination_depot {
                    errors.push(InventoryError::validation(
                        "destination_depot",
                        "source and destination depots must differ",
                    ));
                }
                for (i, line) in lines.iter().enumerate() {
                    check_positive_quantity(&mut errors, i, &line.quantity);
                    if let LotAllocation::Explicit { lots } = &line.allocation {
                        if lots.is_empty() {
                            errors.push(InventoryError::validation(
                                format!("lines[{i}].allocation.lots"),
                                "explicit allocation needs at least one lot",
                            ));
                        }
                        check_selections(&mut errors, i, lots);
                    }
                }
            }
            MovementKind::Exit { depot_id, lines } => {
                for (i, line) in lines.iter().enumerate() {
                    check_decrease(&mut errors, i, *depot_id, line.article_id, line.quantity_kg, &line.lots);
                }
            }
            MovementKind::Adjustment {
                depot_id,
                article_id,
                delta,
            } => match delta {
                AdjustmentDelta::Increase { quantity, unit_cost, .. } => {
                    check_positive_quantity(&mut errors, 0, quantity);
                    check_unit_cost(&mut errors, 0, *unit_cost);
                }
                AdjustmentDelta::Decrease { quantity_kg, lots } => {
                    check_decrease(&mut errors, 0, *depot_id, *article_id, *quantity_kg, lots);
                }
                AdjustmentDelta::Commercialisable { delta_kg } => {
                    if delta_kg.is_zero() {
                        errors.push(InventoryError::validation("delta_kg", "delta cannot be zero"));
                    }
                }
            },
        }

        errors
    }
}

fn check_positive_quantity(errors: &mut Vec<InventoryError>, line: usize, quantity: &Quantity) {
    if !quantity.is_positive() {
        errors.push(InventoryError::validation(
            format!("lines[{line}].quantity"),
            format!("quantity must be > 0, got {}", quantity.amount()),
        ));
    }
}

fn check_unit_cost(errors: &mut Vec<InventoryError>, line: usize, unit_cost: Decimal) {
    if unit_cost < Decimal::ZERO {
        errors.push(InventoryError::validation(
            format!("lines[{line}].unit_cost"),
            format!("unit cost must be >= 0, got {unit_cost}"),
        ));
    }
}

fn check_selections(errors: &mut Vec<InventoryError>, line: usize, lots: &[LotSelection]) {
    for selection in lots {
        if selection.quantity_kg <= Decimal::ZERO {
            errors.push(InventoryError::validation(
                format!("lines[{line}].lots"),
                format!("quantity for lot {} must be > 0", selection.lot_id),
            ));
        }
    }
}

fn check_decrease(
    errors: &mut Vec<InventoryError>,
    line: usize,
    depot_id: DepotId,
    article_id: ArticleId,
    quantity_kg: Decimal,
    lots: &[LotSelection],
) {
    if quantity_kg <= Decimal::ZERO {
        errors.push(InventoryError::validation(
            format!("lines[{line}].quantity_kg"),
            format!("quantity must be > 0, got {quantity_kg}"),
        ));
        return;
    }
    if lots.is_empty() {
        errors.push(InventoryError::MissingLotSelection {
            article_id,
            depot_id,
            quantity_kg,
        });
    }
    check_selections(errors, line, lots);
}

/// A movement and where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movement {
    id: MovementId,
    kind: MovementKind,
    occurred_at: DateTime<Utc>,
    status: MovementStatus,
}

impl Movement {
    /// Build a draft movement, rejecting payloads whose shape does not fit the kind.
    pub fn new(id: MovementId, kind: MovementKind, occurred_at: DateTime<Utc>) -> Result<Self, MovementRejection> {
        let errors = kind.shape_errors();
        if !errors.is_empty() {
            return Err(MovementRejection::new(Some(id), errors));
        }
        Ok(Self {
            id,
            kind,
            occurred_at,
            status: MovementStatus::Draft,
        })
    }

    pub fn id(&self) -> MovementId {
        self.id
    }

    pub fn kind(&self) -> &MovementKind {
        &self.kind
    }

    pub fn movement_type(&self) -> MovementType {
        self.kind.movement_type()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn status(&self) -> MovementStatus {
        self.status
    }

    pub fn mark_validated(&mut self) -> DomainResult<()> {
        self.status = self.status.transition(MovementStatus::Validated)?;
        Ok(())
    }

    pub fn mark_applied(&mut self) -> DomainResult<()> {
        self.status = self.status.transition(MovementStatus::Applied)?;
        Ok(())
    }

    pub fn mark_rejected(&mut self) -> DomainResult<()> {
        self.status = self.status.transition(MovementStatus::Rejected)?;
        Ok(())
    }

    /// Put a movement that failed commit-time checks back to draft for a retry.
    pub fn redraft(&self) -> Self {
        Self {
            status: MovementStatus::Draft,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(lines: Vec<EntryLine>) -> MovementKind {
        MovementKind::Entry {
            depot_id: DepotId::new(),
            lines,
        }
    }

    fn entry_line(kg: Decimal, cost: Decimal) -> EntryLine {
        EntryLine {
            article_id: ArticleId::new(),
            quantity: Quantity::Kg(kg),
            unit_cost: cost,
            currency: None,
            batch_number: None,
            quarantined: false,
        }
    }

    #[test]
    fn status_machine_allows_only_forward_moves() {
        use MovementStatus::*;
        assert_eq!(Draft.transition(Validated).unwrap(), Validated);
        assert_eq!(Validated.transition(Applied).unwrap(), Applied);
        assert_eq!(Validated.transition(Rejected).unwrap(), Rejected);
        assert!(Draft.transition(Applied).is_err());
        assert!(Applied.transition(Rejected).is_err());
        assert!(Rejected.transition(Validated).is_err());
    }

    #[test]
    fn draft_goes_through_lifecycle() {
        let mut movement = Movement::new(MovementId::new(), entry(vec![entry_line(dec!(10), dec!(1))]), Utc::now()).unwrap();
        assert_eq!(movement.status(), MovementStatus::Draft);

        movement.mark_validated().unwrap();
        movement.mark_applied().unwrap();
        assert!(movement.status().is_final());
        assert!(movement.mark_rejected().is_err());
    }

    #[test]
    fn collects_every_shape_error() {
        let kind = entry(vec![entry_line(dec!(0), dec!(1)), entry_line(dec!(5), dec!(-2))]);
        let rejection = Movement::new(MovementId::new(), kind, Utc::now()).unwrap_err();
        assert_eq!(rejection.errors.len(), 2);
    }

    #[test]
    fn transfer_needs_distinct_depots() {
        let depot = DepotId::new();
        let kind = MovementKind::Transfer {
            source_depot: depot,
            destination_depot: depot,
            lines: vec![TransferLine {
                article_id: ArticleId::new(),
                quantity: Quantity::Kg(dec!(1)),
                allocation: LotAllocation::Fifo,
            }],
        };
        let rejection = Movement::new(MovementId::new(), kind, Utc::now()).unwrap_err();
        assert_eq!(rejection.errors[0].code(), "validation_error");
    }

    #[test]
    fn decrease_without_lots_is_missing_selection() {
        let kind = MovementKind::Adjustment {
            depot_id: DepotId::new(),
            article_id: ArticleId::new(),
            delta: AdjustmentDelta::Decrease {
                quantity_kg: dec!(50),
                lots: vec![],
            },
        };
        let rejection = Movement::new(MovementId::new(), kind, Utc::now()).unwrap_err();
        assert!(matches!(
            rejection.errors.as_slice(),
            [InventoryError::MissingLotSelection { quantity_kg, .. }] if *quantity_kg == dec!(50)
        ));
    }

    #[test]
    fn signed_adjustments_pick_their_variant() {
        let (depot, article) = (DepotId::new(), ArticleId::new());

        assert!(matches!(
            AdjustmentDelta::from_signed(depot, article, dec!(-50), None, None, None),
            Err(InventoryError::MissingLotSelection { .. })
        ));
        assert!(matches!(
            AdjustmentDelta::from_signed(depot, article, dec!(20), None, None, None),
            Err(InventoryError::Validation { .. })
        ));
        assert!(matches!(
            AdjustmentDelta::from_signed(depot, article, dec!(20), None, Some(dec!(9)), None),
            Ok(AdjustmentDelta::Increase { .. })
        ));
        let lots = vec![LotSelection::new(LotId::new(), dec!(5))];
        assert!(matches!(
            AdjustmentDelta::from_signed(depot, article, dec!(-5), Some(lots), None, None),
            Ok(AdjustmentDelta::Decrease { quantity_kg, .. }) if quantity_kg == dec!(5)
        ));
    }

    #[test]
    fn deserializes_tagged_payloads() {
        let json = serde_json::json!({
            "type": "transfer",
            "source_depot": DepotId::new(),
            "destination_depot": DepotId::new(),
            "lines": [{ "article_id": ArticleId::new(), "quantity": { "kg": 300 } }]
        });
        let kind: MovementKind = serde_json::from_value(json).unwrap();

        match kind {
            MovementKind::Transfer { lines, .. } => assert_eq!(lines[0].allocation, LotAllocation::Fifo),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
