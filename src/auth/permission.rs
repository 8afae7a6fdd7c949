use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::database::StoreError;
use crate::model::schema::ModelSchema;

/// A CRUD bitmask. Bits are independent; an empty mask means "no
/// permission", not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const CREATE: Permissions = Permissions(0b1000);
    pub const READ: Permissions = Permissions(0b0100);
    pub const UPDATE: Permissions = Permissions(0b0010);
    pub const DELETE: Permissions = Permissions(0b0001);
    pub const ALL: Permissions = Permissions(0b1111);

    pub const fn from_bits(bits: u8) -> Self {
        Permissions(bits & 0b1111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit of `desired` is present in `self`.
    pub const fn grants(self, desired: Permissions) -> bool {
        self.0 & desired.0 == desired.0
    }

    pub const fn union(self, other: Permissions) -> Permissions {
        Permissions(self.0 | other.0)
    }
}

impl std::ops::BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        self.union(rhs)
    }
}

/// Renders as `CRUD` with `-` for missing bits, e.g. `R---`.
impl std::fmt::Display for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", if self.grants(Permissions::CREATE) { 'C' } else { '-' })?;
        write!(f, "{}", if self.grants(Permissions::READ) { 'R' } else { '-' })?;
        write!(f, "{}", if self.grants(Permissions::UPDATE) { 'U' } else { '-' })?;
        write!(f, "{}", if self.grants(Permissions::DELETE) { 'D' } else { '-' })
    }
}

/// Permission groups, in ascending privilege order. `Owner` is a pseudo
/// group: its matrix row is consulted only when the caller is verified to
/// own the specific record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserGroup {
    #[default]
    Other = 0,
    Owner = 1,
    Guest = 2,
    User = 3,
    Admin = 4,
}

pub const NUM_GROUPS: usize = 5;

impl UserGroup {
    pub fn from_id(id: i64) -> Option<UserGroup> {
        match id {
            0 => Some(UserGroup::Other),
            1 => Some(UserGroup::Owner),
            2 => Some(UserGroup::Guest),
            3 => Some(UserGroup::User),
            4 => Some(UserGroup::Admin),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UserGroup::Other => "other",
            UserGroup::Owner => "owner",
            UserGroup::Guest => "guest",
            UserGroup::User => "user",
            UserGroup::Admin => "admin",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// The caller's resolved identity for one request. `user_id` and
/// `owner_field` must both be present for the owner tier to activate.
#[derive(Debug, Clone, Default)]
pub struct PermissionParams {
    pub group: UserGroup,
    pub user_id: Option<i64>,
    pub owner_field: Option<&'static str>,
}

impl PermissionParams {
    /// Params for a resource whose ownership is recorded in `field`.
    pub fn owned_by(field: &'static str) -> Self {
        Self { owner_field: Some(field), ..Self::default() }
    }

    pub fn owner_tier_active(&self) -> bool {
        self.user_id.is_some() && self.owner_field.is_some()
    }
}

/// Per-table grant table: one row per group, column 0 is the instance-level
/// grant, then one column per schema field in declaration order.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    schema: &'static ModelSchema,
    rows: Vec<Vec<Permissions>>,
}

impl PermissionMatrix {
    /// All-zero matrix (nothing granted to anyone).
    pub fn empty(schema: &'static ModelSchema) -> Self {
        Self { schema, rows: vec![vec![Permissions::NONE; schema.len() + 1]; NUM_GROUPS] }
    }

    /// Load the matrix for `table` from its `<table>_permissions` side
    /// table. Rows with an unknown group id and columns the schema does not
    /// declare are ignored; missing rows stay all-zero.
    pub async fn load(
        pool: &PgPool,
        schema: &'static ModelSchema,
        table: &str,
    ) -> Result<Self, StoreError> {
        let mut matrix = Self::empty(schema);
        let statement = format!("SELECT * FROM \"{}_permissions\"", table);
        let rows = sqlx::query(&statement).fetch_all(pool).await?;
        for row in &rows {
            let Some(group) = read_cell(row, "group_id").and_then(UserGroup::from_id) else {
                continue;
            };
            if let Some(bits) = read_cell(row, "instance") {
                matrix.rows[group.index()][0] = Permissions::from_bits(bits as u8);
            }
            for (index, spec) in schema.fields.iter().enumerate() {
                if let Some(bits) = read_cell(row, spec.name) {
                    matrix.rows[group.index()][index + 1] = Permissions::from_bits(bits as u8);
                }
            }
        }
        Ok(matrix)
    }

    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    /// Instance-level grant: may this group touch the resource type at all.
    pub fn instance(&self, group: UserGroup) -> Permissions {
        self.rows[group.index()][0]
    }

    /// Field-level grant by schema field index.
    pub fn field(&self, group: UserGroup, field_index: usize) -> Permissions {
        self.rows[group.index()][field_index + 1]
    }

    pub fn set_instance(&mut self, group: UserGroup, perms: Permissions) {
        self.rows[group.index()][0] = perms;
    }

    pub fn set_field(&mut self, group: UserGroup, field_index: usize, perms: Permissions) {
        self.rows[group.index()][field_index + 1] = perms;
    }

    /// Render the matrix as `{group: {"instance": "CRUD", field: "CR--"}}`.
    pub fn describe(&self) -> Value {
        let mut result = Map::new();
        for group in
            [UserGroup::Other, UserGroup::Owner, UserGroup::Guest, UserGroup::User, UserGroup::Admin]
        {
            let mut entry = Map::new();
            entry.insert("instance".to_string(), Value::from(self.instance(group).to_string()));
            for (index, spec) in self.schema.fields.iter().enumerate() {
                entry.insert(spec.name.to_string(), Value::from(self.field(group, index).to_string()));
            }
            result.insert(group.name().to_string(), Value::Object(entry));
        }
        Value::Object(result)
    }
}

fn read_cell(row: &PgRow, column: &str) -> Option<i64> {
    row.try_get::<i64, _>(column)
        .ok()
        .or_else(|| row.try_get::<i32, _>(column).ok().map(i64::from))
        .or_else(|| row.try_get::<i16, _>(column).ok().map(i64::from))
}
