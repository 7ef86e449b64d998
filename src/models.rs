use std::fmt;
use std::io::Write;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// Transitions are forward-only: the only legal transition is
/// `Received -> Done`, performed by the processor during one dispatch call.
/// Stored as lowercase text in the `state` column; an unrecognized stored
/// value is a deserialization error, so a task is never observed in an
/// undefined state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Received,
    Done,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Received => "received",
            TaskState::Done => "done",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Pg> for TaskState {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for TaskState {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match value.as_bytes() {
            b"received" => Ok(TaskState::Received),
            b"done" => Ok(TaskState::Done),
            other => Err(format!(
                "unrecognized task state: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

/// A persisted task, as read back from the store.
#[derive(Identifiable, Queryable, Selectable, Serialize, Debug)]
#[diesel(table_name = crate::schema::tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: i32,
    /// Caller-supplied category. Named `type` on the wire and in the table.
    pub kind: i32,
    /// Simulated processing duration in milliseconds.
    pub value: i32,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An in-flight task, owned exclusively by the processor until it is
/// persisted. `created_at` is fixed at admission; `updated_at` is refreshed
/// on every state transition.
#[derive(Debug, Clone, Serialize, Insertable)]
#[diesel(table_name = crate::schema::tasks)]
pub struct NewTask {
    pub kind: i32,
    pub value: i32,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
