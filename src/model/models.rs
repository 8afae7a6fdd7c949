//! Record type definitions for the gallery service.

use crate::model::constraint::Constraint;
use crate::model::field::FieldKind;
use crate::model::schema::{FieldSpec, ModelSchema};

pub static USER: ModelSchema = ModelSchema {
    name: "user",
    fields: &[
        FieldSpec { name: "id", kind: FieldKind::Int, constraints: &[Constraint::Unique] },
        FieldSpec {
            name: "username",
            kind: FieldKind::Text,
            constraints: &[
                Constraint::Unique,
                Constraint::Length { min: 1, max: 20 },
                Constraint::Required,
            ],
        },
        FieldSpec {
            name: "password",
            kind: FieldKind::Text,
            constraints: &[Constraint::Required, Constraint::ValidPassword],
        },
        FieldSpec {
            name: "email",
            kind: FieldKind::Text,
            constraints: &[Constraint::Unique, Constraint::Required, Constraint::ValidEmail],
        },
        FieldSpec {
            name: "firstname",
            kind: FieldKind::Text,
            constraints: &[Constraint::Length { min: 2, max: 64 }],
        },
        FieldSpec {
            name: "lastname",
            kind: FieldKind::Text,
            constraints: &[Constraint::Length { min: 2, max: 64 }],
        },
        FieldSpec { name: "born", kind: FieldKind::Text, constraints: &[Constraint::IsoDate] },
        FieldSpec { name: "gender", kind: FieldKind::Text, constraints: &[Constraint::ValidGender] },
        FieldSpec {
            name: "biography",
            kind: FieldKind::Text,
            constraints: &[Constraint::Length { min: 0, max: 8192 }],
        },
        FieldSpec { name: "join_date", kind: FieldKind::Text, constraints: &[Constraint::IsoDate] },
        FieldSpec { name: "permission_group", kind: FieldKind::Int, constraints: &[] },
    ],
};

pub static PHOTO: ModelSchema = ModelSchema {
    name: "photo",
    fields: &[
        FieldSpec { name: "id", kind: FieldKind::Int, constraints: &[Constraint::Unique] },
        FieldSpec {
            name: "extension",
            kind: FieldKind::Text,
            constraints: &[Constraint::Required, Constraint::ValidImageExtension],
        },
        FieldSpec {
            name: "title",
            kind: FieldKind::Text,
            constraints: &[Constraint::Length { min: 1, max: 255 }, Constraint::Required],
        },
        FieldSpec {
            name: "category",
            kind: FieldKind::Text,
            constraints: &[
                Constraint::Length { min: 0, max: 255 },
                Constraint::Required,
                Constraint::ValidCategory,
            ],
        },
        FieldSpec {
            name: "description",
            kind: FieldKind::Text,
            constraints: &[Constraint::Length { min: 0, max: 4096 }],
        },
        FieldSpec { name: "uploaded_by", kind: FieldKind::Int, constraints: &[Constraint::Unique] },
        FieldSpec { name: "upload_time", kind: FieldKind::Text, constraints: &[] },
        FieldSpec {
            name: "is_private",
            kind: FieldKind::Int,
            constraints: &[Constraint::Required, Constraint::Between { min: 0, max: 1 }],
        },
    ],
};

/// Request-parameter model for login.
pub static CREDENTIALS: ModelSchema = ModelSchema {
    name: "credentials",
    fields: &[
        FieldSpec {
            name: "username",
            kind: FieldKind::Text,
            constraints: &[
                Constraint::Unique,
                Constraint::Length { min: 1, max: 20 },
                Constraint::Required,
            ],
        },
        FieldSpec {
            name: "password",
            kind: FieldKind::Text,
            constraints: &[Constraint::Required, Constraint::ValidPassword],
        },
    ],
};
