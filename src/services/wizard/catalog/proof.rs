//! Proof Elements
//!
//! Collects the core promise of an offer and the evidence behind it.

use wizard_flow_core::{Choice, FieldSpec, RepeatableGroup, Rule, WizardModel};

use crate::utils::error::AppResult;

pub const STEP: &str = "proof_elements";

pub fn proof_elements() -> AppResult<WizardModel> {
    let proof = RepeatableGroup::new("proof", "ask-more-proof", "Would you like to add another proof element?")
        .min_items(1)
        .field(FieldSpec::required(
            "type",
            "Proof type",
            Rule::Choice {
                options: vec![
                    Choice::new("testimonial", "Testimonial"),
                    Choice::new("case_study", "Case study"),
                    Choice::new("statistic", "Statistic"),
                    Choice::new("award", "Award"),
                    Choice::new("media_mention", "Media mention"),
                ],
            },
        ))
        .field(FieldSpec::required(
            "description",
            "Description",
            Rule::MinLength { min: 10 },
        ))
        .field(FieldSpec::optional("url", "Link", Rule::Url));

    let model = WizardModel::builder(STEP)
        .field(FieldSpec::required(
            "corePromise",
            "Core promise",
            Rule::MinLength { min: 20 },
        ))
        .group(proof)
        .trailing(FieldSpec::optional("notes", "Anything else about your proof?", Rule::Text))
        .build()?;
    Ok(model)
}
