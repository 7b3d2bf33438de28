use std::sync::Arc;

use async_graphql::{scalar, Context, Object, Result, SimpleObject};

use crate::filter::{default_operator_for, Catalog, Operator, ValueType};

scalar!(ValueType);
scalar!(Operator);

#[derive(SimpleObject)]
pub(crate) struct Field {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) value_type: ValueType,
    pub(crate) operators: Vec<Operator>,
    pub(crate) default_operator: Operator,
}

#[derive(Default)]
pub(super) struct CatalogQuery;

#[Object]
impl CatalogQuery {
    /// Every field a condition may refer to, with the operators it accepts.
    async fn field_catalog(&self, ctx: &Context<'_>) -> Result<Vec<Field>> {
        let catalog = ctx.data::<Arc<Catalog>>()?;
        Ok(catalog
            .fields()
            .iter()
            .map(|field| Field {
                id: field.id.clone(),
                label: field.label.clone(),
                value_type: field.value_type,
                operators: field.value_type.operators().to_vec(),
                default_operator: default_operator_for(field.value_type),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::TestSchema;

    #[tokio::test]
    async fn catalog_lists_operators() {
        let schema = TestSchema::new();
        let res = schema
            .execute("{ fieldCatalog { id valueType defaultOperator operators } }")
            .await;
        let data = res.data.into_json().unwrap();
        let tags = data["fieldCatalog"]
            .as_array()
            .unwrap()
            .iter()
            .find(|field| field["id"] == "tags")
            .unwrap()
            .clone();
        assert_eq!(tags["valueType"], "multiselect");
        assert_eq!(tags["defaultOperator"], "contains");
        assert!(tags["operators"]
            .as_array()
            .unwrap()
            .iter()
            .any(|operator| operator == "is_empty"));
    }
}
