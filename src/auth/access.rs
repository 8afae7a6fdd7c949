//! The authorization pipeline: TokenVerified → InstanceChecked →
//! FieldsFiltered. A failed step aborts the whole operation; there are no
//! backward transitions and no partial results.

use sqlx::PgPool;

use crate::auth;
use crate::auth::permission::{PermissionMatrix, PermissionParams, Permissions, UserGroup};
use crate::error::ApiError;
use crate::model::field::FieldValue;
use crate::model::schema::ModelSchema;
use crate::model::Model;

/// TokenVerified: resolve the caller's identity. No token means the
/// lowest-privilege group and no identity; a token that fails signature,
/// claim or stored-token checks is a hard `InvalidAuthToken` failure, never
/// a silent downgrade.
pub async fn resolve_params(
    pool: &PgPool,
    token: Option<&str>,
    mut params: PermissionParams,
) -> Result<PermissionParams, ApiError> {
    let Some(token) = token else {
        params.group = UserGroup::Other;
        params.user_id = None;
        return Ok(params);
    };
    let claims = auth::decode_auth_claims(token)?;
    auth::verify_stored(pool, "auth_tokens", "auth_token", claims.user_id, token).await?;
    params.group = UserGroup::from_id(claims.group_id)
        .ok_or_else(|| ApiError::invalid_auth_token("Unknown permission group"))?;
    params.user_id = Some(claims.user_id);
    Ok(params)
}

/// One authorized operation against one resource type. Construction performs
/// the instance check; `filter_fields` applies the field tier per record.
pub struct AuthorizedAccess {
    desired: Permissions,
    params: PermissionParams,
    matrix: PermissionMatrix,
}

impl AuthorizedAccess {
    /// Run TokenVerified and InstanceChecked against the store.
    pub async fn begin(
        pool: &PgPool,
        schema: &'static ModelSchema,
        table: &str,
        desired: Permissions,
        token: Option<&str>,
        params: PermissionParams,
    ) -> Result<Self, ApiError> {
        let params = resolve_params(pool, token, params).await?;
        let matrix = PermissionMatrix::load(pool, schema, table).await?;
        Self::check_instance(desired, params, matrix)
    }

    /// InstanceChecked on an already-loaded matrix. The group tier is
    /// consulted first; the owner tier applies only when the caller has a
    /// known identity and the resource declares an ownership field. Whichever
    /// tier failed is stripped from the params so field filtering only uses
    /// the tiers that actually granted access.
    pub fn check_instance(
        desired: Permissions,
        mut params: PermissionParams,
        matrix: PermissionMatrix,
    ) -> Result<Self, ApiError> {
        let group_grants = matrix.instance(params.group).grants(desired);
        let owner_grants =
            params.owner_tier_active() && matrix.instance(UserGroup::Owner).grants(desired);

        if !group_grants && !owner_grants {
            return Err(ApiError::unauthorized_for(desired));
        }
        if !group_grants {
            params.group = UserGroup::Other;
        }
        if !owner_grants {
            params.user_id = None;
            params.owner_field = None;
        }

        Ok(Self { desired, params, matrix })
    }

    pub fn params(&self) -> &PermissionParams {
        &self.params
    }

    /// FieldsFiltered: erase every field whose effective mask lacks the
    /// desired bit. The owner row is OR-ed in only when this record's
    /// ownership field equals the caller's id. A record with every field
    /// erased is an authorization failure, not an empty success.
    pub fn filter_fields(&self, model: &mut Model) -> Result<(), ApiError> {
        let schema = model.schema();
        let owner_boost = self.params.owner_tier_active() && self.owns_record(model);

        let mut erased = 0;
        for index in 0..schema.len() {
            let mut perms = self.matrix.field(self.params.group, index);
            if owner_boost {
                perms = perms | self.matrix.field(UserGroup::Owner, index);
            }
            if !perms.grants(self.desired) {
                model.erase(index);
                erased += 1;
            }
        }

        if erased == schema.len() {
            return Err(ApiError::unauthorized_for(self.desired));
        }
        Ok(())
    }

    fn owns_record(&self, model: &Model) -> bool {
        let (Some(user_id), Some(owner_field)) = (self.params.user_id, self.params.owner_field)
        else {
            return false;
        };
        model.get(owner_field) == Some(&FieldValue::Int(user_id))
    }
}
