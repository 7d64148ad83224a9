//! Stage/status coupling rule.

use crate::model::deal::{Deal, DealStage, DealStatus};
use serde::Serialize;

/// Stage/status pair a caller should persist after a stage move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageChange {
    pub stage: DealStage,
    pub status: DealStatus,
}

/// Derives the status that accompanies moving `deal` to `new_stage`.
///
/// - `closed_won` always yields `won`, `closed_lost` always yields `lost`.
/// - Leaving a closed outcome for any other stage reopens the deal.
/// - Otherwise the current status is kept, including `on_hold`.
///
/// Callers validate `new_stage` membership and persist the result.
pub fn reconcile_stage(deal: &Deal, new_stage: DealStage) -> StageChange {
    let status = match new_stage {
        DealStage::ClosedWon => DealStatus::Won,
        DealStage::ClosedLost => DealStatus::Lost,
        _ if deal.status.is_terminal() => DealStatus::Open,
        _ => deal.status,
    };

    StageChange {
        stage: new_stage,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::reconcile_stage;
    use crate::model::deal::{Deal, DealStage, DealStatus};

    fn deal_with(stage: DealStage, status: DealStatus) -> Deal {
        let mut deal = Deal::new("Lakeside duplex");
        deal.stage = stage;
        deal.status = status;
        deal
    }

    #[test]
    fn closing_stages_force_terminal_status() {
        for status in [
            DealStatus::Open,
            DealStatus::Won,
            DealStatus::Lost,
            DealStatus::OnHold,
        ] {
            let deal = deal_with(DealStage::Negotiation, status);
            assert_eq!(
                reconcile_stage(&deal, DealStage::ClosedWon).status,
                DealStatus::Won
            );
            assert_eq!(
                reconcile_stage(&deal, DealStage::ClosedLost).status,
                DealStatus::Lost
            );
        }
    }

    #[test]
    fn leaving_closed_outcome_reopens() {
        let won = deal_with(DealStage::ClosedWon, DealStatus::Won);
        let change = reconcile_stage(&won, DealStage::Qualified);
        assert_eq!(change.stage, DealStage::Qualified);
        assert_eq!(change.status, DealStatus::Open);

        let lost = deal_with(DealStage::ClosedLost, DealStatus::Lost);
        assert_eq!(
            reconcile_stage(&lost, DealStage::Lead).status,
            DealStatus::Open
        );
    }

    #[test]
    fn non_terminal_moves_keep_status() {
        let open = deal_with(DealStage::Qualified, DealStatus::Open);
        assert_eq!(
            reconcile_stage(&open, DealStage::Proposal).status,
            DealStatus::Open
        );

        let on_hold = deal_with(DealStage::Proposal, DealStatus::OnHold);
        assert_eq!(
            reconcile_stage(&on_hold, DealStage::Negotiation).status,
            DealStatus::OnHold
        );
    }
}
