use super::{
    catalog::{Catalog, FieldDescriptor, ValueType},
    condition::{Condition, ConditionError, ConditionValue, Operator},
    evaluate::Evaluator,
};

/// The operator a condition starts with when its field is picked.
pub(crate) fn default_operator_for(value_type: ValueType) -> Operator {
    value_type.operators()[0]
}

/// Produces and edits conditions the way the view editor does.
///
/// Every edit returns a new condition whose operator is legal for its field;
/// values are reset whenever the previous one could no longer apply.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConditionBuilder<'c> {
    catalog: &'c Catalog,
}

impl<'c> ConditionBuilder<'c> {
    pub(crate) fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    fn field(&self, field_id: &str) -> Result<&'c FieldDescriptor, ConditionError> {
        self.catalog
            .field(field_id)
            .ok_or_else(|| ConditionError::UnknownField {
                field_id: field_id.to_string(),
            })
    }

    /// A fresh condition on `field_id` with the field's default operator and a
    /// cleared value.
    pub(crate) fn condition_for(
        &self,
        id: impl Into<String>,
        field_id: &str,
    ) -> Result<Condition, ConditionError> {
        let field = self.field(field_id)?;
        let operator = default_operator_for(field.value_type);
        Ok(Condition::new(
            id,
            field.id.clone(),
            operator,
            operator.cleared_value(),
        ))
    }

    /// Moves a condition to another field. Operator and value both reset.
    pub(crate) fn with_field(
        &self,
        condition: &Condition,
        field_id: &str,
    ) -> Result<Condition, ConditionError> {
        self.condition_for(condition.id.clone(), field_id)
    }

    /// Switches the operator. `is_empty`/`is_not_empty` always drop the value;
    /// otherwise the value survives only if it still has the right shape.
    pub(crate) fn with_operator(
        &self,
        condition: &Condition,
        operator: Operator,
    ) -> Result<Condition, ConditionError> {
        let field = self.field(&condition.field_id)?;
        if !field.value_type.supports(operator) {
            return Err(ConditionError::IllegalOperator {
                field_id: field.id.clone(),
                value_type: field.value_type,
                operator,
            });
        }

        let value = match (&condition.value, operator.cleared_value()) {
            (_, None) => None,
            (Some(ConditionValue::List(list)), Some(ConditionValue::List(_))) => {
                Some(ConditionValue::List(list.clone()))
            }
            (Some(ConditionValue::Scalar(scalar)), Some(ConditionValue::Scalar(_))) => {
                Some(ConditionValue::Scalar(scalar.clone()))
            }
            (_, cleared) => cleared,
        };
        Ok(Condition::new(
            condition.id.clone(),
            condition.field_id.clone(),
            operator,
            value,
        ))
    }

    /// Sets the operand. Ignored for operators that take no value.
    pub(crate) fn with_value(
        &self,
        condition: &Condition,
        value: ConditionValue,
    ) -> Result<Condition, ConditionError> {
        let mut updated = condition.clone();
        if condition.operator.takes_value() {
            updated.value = Some(value);
            updated.check_shape()?;
        }
        Ok(updated)
    }

    /// Full check of a finished condition before it is saved.
    pub(crate) fn validate(&self, condition: &Condition) -> Result<(), ConditionError> {
        Evaluator::new(self.catalog).prepare(condition)?;
        condition.check_complete()
    }
}
