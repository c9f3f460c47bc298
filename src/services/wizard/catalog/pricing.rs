//! Pricing
//!
//! Headline price, trial policy and any number of payment plans.

use wizard_flow_core::{Choice, FieldSpec, RepeatableGroup, Rule, WizardModel};

use crate::utils::error::AppResult;

pub const STEP: &str = "pricing";

pub fn pricing() -> AppResult<WizardModel> {
    let plans = RepeatableGroup::new("plan", "ask-more-plans", "Would you like to add a payment plan?")
        .field(FieldSpec::required("name", "Plan name", Rule::MinLength { min: 2 }))
        .field(FieldSpec::required("amount", "Plan amount", Rule::NonNegativeNumber))
        .field(FieldSpec::required(
            "interval",
            "Billing interval",
            Rule::Choice {
                options: vec![
                    Choice::new("monthly", "Monthly"),
                    Choice::new("quarterly", "Quarterly"),
                    Choice::new("yearly", "Yearly"),
                    Choice::new("one-time", "One-time"),
                ],
            },
        ));

    let model = WizardModel::builder(STEP)
        // Skipped for custom pricing
        .field(FieldSpec::optional("price", "Price", Rule::NonNegativeNumber))
        .field(
            FieldSpec::optional("priceDescription", "What does the price cover?", Rule::Text)
                .shown_if("price"),
        )
        .field(FieldSpec::required("offersTrial", "Do you offer a free trial?", Rule::YesNo))
        .group(plans)
        .trailing(FieldSpec::optional("pricingNotes", "Any other pricing notes?", Rule::Text))
        .build()?;
    Ok(model)
}
