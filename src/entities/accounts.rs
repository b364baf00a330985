use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: Option<String>,

    /// Unique so concurrent federated sign-ups for one address collapse into a single row.
    #[sea_orm(unique)]
    pub email: Option<String>,

    /// Argon2id PHC string. `None` or empty for federated-only accounts.
    pub password_hash: Option<String>,

    /// One of `ACTIVE`, `DISABLED`, `LOCKED`, `PENDING`
    pub status: String,

    pub role_id: i32,

    pub name: Option<String>,

    pub avatar_url: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::roles::Entity",
        from = "Column::RoleId",
        to = "super::roles::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Roles,
}

impl Related<super::roles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Roles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
