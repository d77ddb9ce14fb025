// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User-defined parameters: fixed values or equations over element values.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::Result;
use crate::expression::Expression;
use crate::parameter::ParameterDefinition;
use crate::value::{ParameterType, PrimitiveValue};

/// Group recorded for values produced by user parameters.
pub const USER_PARAMETERS_GROUP: &str = "User Parameters";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum UserParameterValue {
    Fixed(PrimitiveValue),
    Equation(String),
}

/// A parameter the user added on top of the model data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserParameter {
    pub field: String,
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub value: UserParameterValue,
}

impl UserParameter {
    pub fn fixed(field: &str, value: impl Into<PrimitiveValue>) -> Self {
        Self {
            field: field.to_string(),
            header: field.to_string(),
            group: None,
            value: UserParameterValue::Fixed(value.into()),
        }
    }

    pub fn equation(field: &str, expression: &str) -> Self {
        Self {
            field: field.to_string(),
            header: field.to_string(),
            group: None,
            value: UserParameterValue::Equation(expression.to_string()),
        }
    }

    /// Column definition for this parameter.
    pub fn definition(&self) -> ParameterDefinition {
        let param_type = match &self.value {
            UserParameterValue::Fixed(v) => v.parameter_type(),
            UserParameterValue::Equation(_) => ParameterType::Number,
        };
        ParameterDefinition::new(self.field.clone(), self.header.clone(), param_type)
            .with_category(USER_PARAMETERS_GROUP)
            .with_group(self.group.as_deref().unwrap_or(USER_PARAMETERS_GROUP))
    }
}

/// User parameters with their equations parsed once per pass.
#[derive(Debug, Clone)]
pub(crate) struct CompiledUserParameters {
    entries: Vec<(UserParameter, Option<Expression>)>,
}

impl CompiledUserParameters {
    /// Parses every equation; a syntax error fails the whole set.
    pub(crate) fn compile(params: &[UserParameter]) -> Result<Self> {
        let entries = params
            .iter()
            .map(|p| {
                let expr = match &p.value {
                    UserParameterValue::Equation(src) => Some(Expression::parse(src)?),
                    UserParameterValue::Fixed(_) => None,
                };
                Ok((p.clone(), expr))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every user parameter into the element.
    ///
    /// Equations see the element's values including earlier user
    /// parameters. A failed evaluation leaves that field absent.
    pub(crate) fn apply(&self, element: &mut Element) {
        for (param, expr) in &self.entries {
            let group = param.group.as_deref().unwrap_or(USER_PARAMETERS_GROUP);
            let value = match (&param.value, expr) {
                (UserParameterValue::Fixed(v), _) => Some(v.clone()),
                (UserParameterValue::Equation(_), Some(expr)) => match expr.evaluate(&*element) {
                    Ok(n) if n.is_finite() => Some(PrimitiveValue::Number(n)),
                    Ok(n) => {
                        tracing::debug!(element = %element.id, field = %param.field, result = n, "Equation produced a non-finite value");
                        None
                    }
                    Err(e) => {
                        tracing::debug!(element = %element.id, field = %param.field, error = %e, "Equation could not be evaluated");
                        None
                    }
                },
                (UserParameterValue::Equation(_), None) => None,
            };
            if let Some(v) = value {
                element.parameters.insert(param.field.as_str(), v, group);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn equations_chain_over_earlier_parameters() {
        let compiled = CompiledUserParameters::compile(&[
            UserParameter::fixed("Factor", 2.0),
            UserParameter::equation("Doubled Area", "Area * Factor"),
        ])
        .unwrap();
        let mut e = Element::new("1", "Walls", "W1").with_parameter("Area", 4.0);
        compiled.apply(&mut e);
        assert_eq!(
            e.parameters.get("Doubled Area"),
            Some(&PrimitiveValue::Number(8.0))
        );
        assert_eq!(e.parameters.group_of("Factor"), Some(USER_PARAMETERS_GROUP));
    }

    #[test]
    fn failed_evaluation_leaves_field_absent() {
        let compiled =
            CompiledUserParameters::compile(&[UserParameter::equation("Ratio", "Area / Zero")])
                .unwrap();
        let mut e = Element::new("1", "Walls", "W1")
            .with_parameter("Area", 4.0)
            .with_parameter("Zero", 0.0);
        compiled.apply(&mut e);
        assert!(!e.parameters.contains_key("Ratio"));
    }

    #[test]
    fn syntax_error_fails_compile() {
        let result = CompiledUserParameters::compile(&[UserParameter::equation("Bad", "1 +")]);
        assert!(matches!(result, Err(Error::ExpressionParse { .. })));
    }

    #[test]
    fn definition_types() {
        assert_eq!(
            UserParameter::equation("x", "1").definition().param_type,
            ParameterType::Number
        );
        assert_eq!(
            UserParameter::fixed("y", "text").definition().param_type,
            ParameterType::String
        );
    }

    #[test]
    fn serde_shape() {
        let p = UserParameter::equation("Volume", "Area * Height");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["value"]["kind"], "equation");
        assert_eq!(json["value"]["value"], "Area * Height");
    }
}
