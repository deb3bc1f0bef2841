use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Users created through external identity flows may not have picked one yet.
    #[sea_orm(unique)]
    pub username: Option<String>,

    pub name: Option<String>,

    pub active: bool,

    /// Free-form marker set when an administrator deactivates the account.
    pub deactivation_reason: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_emails::Entity")]
    Emails,
    #[sea_orm(has_many = "super::user_roles::Entity")]
    Roles,
}

impl Related<super::user_emails::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Emails.def()
    }
}

impl Related<super::user_roles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Roles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
