use async_graphql::{scalar, Context, Json, Object, Result, SimpleObject};

use crate::{
    api::DateTimeUtc,
    database::{self, Database, SortDirection},
    filter::ConditionGroupSet,
};

scalar!(SortDirection);

#[derive(SimpleObject)]
pub(crate) struct View {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) division_id: String,
    pub(crate) owner_id: String,
    pub(crate) conditions: Json<ConditionGroupSet>,
    pub(crate) columns: Vec<String>,
    pub(crate) group_by: Option<String>,
    pub(crate) order_by: Option<String>,
    pub(crate) sort_direction: SortDirection,
    pub(crate) is_public: bool,
    pub(crate) is_default: bool,
    pub(crate) created_at: DateTimeUtc,
    pub(crate) updated_at: DateTimeUtc,
}

impl From<database::View> for View {
    fn from(view: database::View) -> Self {
        let draft = view.draft;
        Self {
            id: view.id,
            name: draft.name,
            division_id: draft.division_id,
            owner_id: draft.owner_id,
            conditions: Json(draft.conditions),
            columns: draft.columns,
            group_by: draft.group_by,
            order_by: draft.order_by,
            sort_direction: draft.sort_direction,
            is_public: draft.is_public,
            is_default: draft.is_default,
            created_at: DateTimeUtc(view.created_at),
            updated_at: DateTimeUtc(view.updated_at),
        }
    }
}

#[derive(Default)]
pub(super) struct ViewQuery;

#[Object]
impl ViewQuery {
    /// Views in the division that `user_id` may see.
    async fn views(
        &self,
        ctx: &Context<'_>,
        division_id: String,
        user_id: Option<String>,
    ) -> Result<Vec<View>> {
        let db = ctx.data::<Database>()?;
        Ok(db
            .visible_views(&division_id, user_id.as_deref())?
            .into_iter()
            .map(View::from)
            .collect())
    }

    async fn view(&self, ctx: &Context<'_>, id: String) -> Result<Option<View>> {
        let db = ctx.data::<Database>()?;
        Ok(db.view(&id)?.map(View::from))
    }
}
