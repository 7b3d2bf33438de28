use std::{fmt, sync::Arc};

use async_graphql::{
    connection::{query, Connection, EmptyFields},
    Context, Object, Result, SimpleObject,
};

use crate::{
    api::{self, DateTimeUtc},
    database::{self, Database},
    filter::{self, Catalog, ConditionGroupSet, Evaluator},
};

#[derive(SimpleObject)]
pub(crate) struct Ticket {
    pub(crate) id: u64,
    pub(crate) subject: String,
    pub(crate) description: String,
    pub(crate) status: String,
    pub(crate) priority: String,
    #[graphql(name = "type")]
    pub(crate) ticket_type: String,
    pub(crate) channel: String,
    pub(crate) requester: String,
    pub(crate) assignee: Option<String>,
    pub(crate) group: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) replies: u32,
    pub(crate) created_at: DateTimeUtc,
    pub(crate) updated_at: DateTimeUtc,
    pub(crate) due_at: Option<DateTimeUtc>,
}

impl From<database::Ticket> for Ticket {
    fn from(ticket: database::Ticket) -> Self {
        Self {
            id: ticket.id,
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status,
            priority: ticket.priority,
            ticket_type: ticket.ticket_type,
            channel: ticket.channel,
            requester: ticket.requester,
            assignee: ticket.assignee,
            group: ticket.group,
            tags: ticket.tags,
            replies: ticket.replies,
            created_at: DateTimeUtc(ticket.created_at),
            updated_at: DateTimeUtc(ticket.updated_at),
            due_at: ticket.due_at.map(DateTimeUtc),
        }
    }
}

/// Same text as the stored key, so cursors can be fed back into range scans.
impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:020}", self.id)
    }
}

#[derive(Default)]
pub(super) struct TicketQuery;

#[Object]
impl TicketQuery {
    /// Tickets in id order, narrowed to those matching the saved view
    /// `view_id` when one is given.
    async fn tickets(
        &self,
        ctx: &Context<'_>,
        view_id: Option<String>,
        after: Option<String>,
        before: Option<String>,
        first: Option<i32>,
        last: Option<i32>,
    ) -> Result<Connection<String, Ticket, EmptyFields, EmptyFields>> {
        let db = ctx.data::<Database>()?;
        let catalog = ctx.data::<Arc<Catalog>>()?;
        let conditions = match view_id {
            Some(id) => {
                db.view(&id)?
                    .ok_or_else(|| format!("view {id} not found"))?
                    .draft
                    .conditions
            }
            None => ConditionGroupSet::default(),
        };
        let evaluator = Evaluator::new(catalog);
        filter::log_diagnostics(evaluator, &conditions);

        query(
            after,
            before,
            first,
            last,
            |after, before, first, last| async move {
                let conditions = &conditions;
                api::load_connection(
                    ctx,
                    |db: &Database, start, end| {
                        db.tickets(start, end)
                            .filter(move |ticket| {
                                ticket
                                    .as_ref()
                                    .map_or(true, |ticket| evaluator.matches(ticket, conditions))
                            })
                            .map(|ticket| ticket.map(Ticket::from))
                    },
                    after,
                    before,
                    first,
                    last,
                )
            },
        )
        .await
    }
}
