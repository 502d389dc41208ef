//! Deterministic recommendation arithmetic.
//!
//! The model backend only ever contributes narrative text. Every number
//! that reaches a customer — monthly normalization, savings, the
//! consolidation threshold — is computed here and nowhere else.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::plan::Plan;
use crate::PlanId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub plan_id: PlanId,
    pub plan_name: String,
    pub reasoning: String,
    /// Signed, monthly-normalized, rounded to two decimals. Positive
    /// means the customer would spend less than today.
    pub potential_savings: Decimal,
    pub benefits: Vec<String>,
    pub cost_implication: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostImplication {
    Savings,
    AdditionalCost,
    SimilarCost,
}

impl CostImplication {
    pub fn from_savings(savings: Decimal) -> Self {
        if savings > Decimal::ZERO {
            Self::Savings
        } else if savings < Decimal::ZERO {
            Self::AdditionalCost
        } else {
            Self::SimilarCost
        }
    }

    pub fn phrase(&self, savings: Decimal) -> String {
        match self {
            Self::Savings => format!("Save ${:.2} per month", savings),
            Self::AdditionalCost => {
                format!("Additional cost of ${:.2} per month", savings.abs())
            }
            Self::SimilarCost => "Similar cost to your current spend".to_string(),
        }
    }
}

/// Sum of monthly-normalized prices across the given plans.
pub fn current_monthly_total(plans: &[Plan]) -> Decimal {
    plans.iter().map(Plan::monthly_price).sum()
}

/// Monthly savings of moving from `current_monthly` spend onto `plan`,
/// rounded to two decimals.
pub fn savings_against(current_monthly: Decimal, plan: &Plan) -> Decimal {
    (current_monthly - plan.monthly_price()).round_dp(2)
}

/// Builds a recommendation for `plan`, recomputing savings from the
/// current monthly spend and deriving the cost implication from the
/// savings sign. Narrative fields are passed through untouched.
pub fn build_recommendation(
    plan: &Plan,
    current_monthly: Decimal,
    reasoning: String,
    benefits: Vec<String>,
) -> Recommendation {
    let potential_savings = savings_against(current_monthly, plan);
    let cost_implication =
        CostImplication::from_savings(potential_savings).phrase(potential_savings);
    Recommendation {
        plan_id: plan.id.clone(),
        plan_name: plan.name.clone(),
        reasoning,
        potential_savings,
        benefits,
        cost_implication,
    }
}

/// Canned recommendation for customers with no active subscriptions.
/// Prefers a plan named "starter", otherwise the cheapest by monthly
/// price. Returns `None` only for an empty catalog.
pub fn starter_recommendation(catalog: &[Plan]) -> Option<Recommendation> {
    let starter = catalog
        .iter()
        .find(|plan| plan.name.to_lowercase().contains("starter") || plan.id.0 == "starter")
        .or_else(|| catalog.iter().min_by_key(|plan| plan.monthly_price()))?;

    Some(build_recommendation(
        starter,
        Decimal::ZERO,
        "You don't have any active subscriptions yet. The starter plan is the \
         simplest way to get going; you can upgrade at any time."
            .to_string(),
        vec![
            "Lowest monthly commitment".to_string(),
            "Full access to core features".to_string(),
            "Upgrade whenever you need more".to_string(),
        ],
    ))
}

fn is_top_tier(plan: &Plan) -> bool {
    let name = plan.name.to_lowercase();
    let id = plan.id.0.to_lowercase();
    name.contains("premium")
        || name.contains("enterprise")
        || id.contains("premium")
        || id.contains("enterprise")
}

/// Consolidation: with two or more active subscriptions, propose
/// replacing them with one top-tier plan when that plan's monthly price
/// is strictly below the summed current monthly prices. The reasoning is
/// template-generated, never model text.
pub fn consolidation_recommendation(
    active_plans: &[Plan],
    catalog: &[Plan],
) -> Option<Recommendation> {
    if active_plans.len() < 2 {
        return None;
    }

    let candidate = catalog
        .iter()
        .filter(|plan| is_top_tier(plan))
        .max_by_key(|plan| plan.monthly_price())?;

    let current_monthly = current_monthly_total(active_plans);
    if candidate.monthly_price() >= current_monthly {
        return None;
    }

    let savings = savings_against(current_monthly, candidate);
    let reasoning = format!(
        "You have {} active subscriptions totalling ${:.2} per month. \
         Consolidating them into the {} plan would cost ${:.2} per month, \
         saving you ${:.2}.",
        active_plans.len(),
        current_monthly.round_dp(2),
        candidate.name,
        candidate.monthly_price().round_dp(2),
        savings,
    );
    let benefits = vec![
        format!("One plan instead of {}", active_plans.len()),
        "Single monthly invoice".to_string(),
        format!("Everything included in {}", candidate.name),
    ];

    Some(build_recommendation(candidate, current_monthly, reasoning, benefits))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::plan::{BillingCycle, Plan, PlanId};

    use super::{
        consolidation_recommendation, current_monthly_total, starter_recommendation,
        CostImplication,
    };

    fn plan(id: &str, name: &str, price: Decimal, cycle: BillingCycle) -> Plan {
        Plan { id: PlanId(id.to_string()), name: name.to_string(), price, billing_cycle: cycle }
    }

    fn monthly(id: &str, name: &str, cents: i64) -> Plan {
        plan(id, name, Decimal::new(cents, 2), BillingCycle::Monthly)
    }

    #[test]
    fn monthly_total_normalizes_yearly_plans() {
        let plans = vec![
            monthly("basic", "Basic", 999),
            plan("pro-annual", "Pro Annual", Decimal::from(120), BillingCycle::Yearly),
        ];
        assert_eq!(current_monthly_total(&plans), Decimal::new(1999, 2));
    }

    #[test]
    fn expensive_enterprise_plan_yields_no_consolidation() {
        let active = vec![monthly("basic", "Basic", 999), monthly("premium", "Premium", 2999)];
        let catalog = vec![
            monthly("basic", "Basic", 999),
            monthly("premium", "Premium", 2999),
            monthly("enterprise", "Enterprise", 9999),
        ];

        // 99.99 > 9.99 + 29.99, so consolidating would cost more.
        assert!(consolidation_recommendation(&active, &catalog).is_none());
    }

    #[test]
    fn cheaper_enterprise_plan_yields_consolidation_with_recomputed_savings() {
        let active = vec![monthly("basic", "Basic", 999), monthly("premium", "Premium", 2999)];
        let catalog = vec![
            monthly("basic", "Basic", 999),
            monthly("premium", "Premium", 2999),
            monthly("enterprise", "Enterprise", 2999),
        ];

        let recommendation = consolidation_recommendation(&active, &catalog)
            .expect("enterprise at 29.99 beats 39.98 of current spend");

        assert_eq!(recommendation.plan_id.0, "enterprise");
        assert_eq!(recommendation.potential_savings, Decimal::new(999, 2));
        assert!(recommendation.reasoning.contains("2 active subscriptions"));
        assert!(recommendation.cost_implication.starts_with("Save"));
    }

    #[test]
    fn single_subscription_never_consolidates() {
        let active = vec![monthly("premium", "Premium", 2999)];
        let catalog = vec![monthly("enterprise", "Enterprise", 999)];
        assert!(consolidation_recommendation(&active, &catalog).is_none());
    }

    #[test]
    fn equal_price_is_not_a_consolidation() {
        let active = vec![monthly("a", "A", 1000), monthly("b", "B", 1000)];
        let catalog = vec![monthly("enterprise", "Enterprise", 2000)];
        // Strictly-less comparison: equal monthly cost does not qualify.
        assert!(consolidation_recommendation(&active, &catalog).is_none());
    }

    #[test]
    fn starter_recommendation_prefers_the_starter_plan() {
        let catalog = vec![
            monthly("premium", "Premium", 2999),
            monthly("starter", "Starter", 999),
        ];
        let recommendation =
            starter_recommendation(&catalog).expect("catalog is non-empty");
        assert_eq!(recommendation.plan_id.0, "starter");
        assert_eq!(recommendation.potential_savings, Decimal::new(-999, 2));
        assert!(recommendation.cost_implication.starts_with("Additional cost"));
    }

    #[test]
    fn starter_recommendation_falls_back_to_cheapest() {
        let catalog = vec![
            monthly("premium", "Premium", 2999),
            monthly("basic", "Basic", 999),
        ];
        let recommendation =
            starter_recommendation(&catalog).expect("catalog is non-empty");
        assert_eq!(recommendation.plan_id.0, "basic");
    }

    #[test]
    fn cost_implication_phrasing_follows_savings_sign() {
        assert_eq!(
            CostImplication::from_savings(Decimal::new(500, 2)).phrase(Decimal::new(500, 2)),
            "Save $5.00 per month"
        );
        assert_eq!(
            CostImplication::from_savings(Decimal::new(-500, 2)).phrase(Decimal::new(-500, 2)),
            "Additional cost of $5.00 per month"
        );
        assert_eq!(
            CostImplication::from_savings(Decimal::ZERO).phrase(Decimal::ZERO),
            "Similar cost to your current spend"
        );
    }
}
