pub mod prelude {
    pub use entity::prelude::*;
    pub use entity::sea_orm_active_enums::*;
    pub use entity::{auto_reply_rule, automation_log, follow_up_task, inbound_email, user};
    pub use sea_orm::sea_query::Expr;
    pub use sea_orm::{
        entity::prelude::*, query::*, ActiveValue, DatabaseConnection, DbErr, FromQueryResult,
        InsertResult, RuntimeErr, Set, SqlErr, TransactionTrait, Value,
    };
}
