// Equality filters and sort keys over indexed record fields

use crate::record::IndexValue;

/// Matches records whose indexed `field` equals `value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: IndexValue,
}

impl Filter {
    pub fn eq_str(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: IndexValue::String(value.into()),
        }
    }

    /// SQL fragment for an `EXISTS` sub-select against `record_indexes`.
    ///
    /// `alias` must be unique per filter in one query; `field_param` and
    /// `value_param` are the positional parameter numbers to bind.
    pub(crate) fn to_exists_clause(&self, alias: &str, field_param: usize, value_param: usize) -> String {
        format!(
            " AND EXISTS (
                SELECT 1 FROM record_indexes {a}
                WHERE {a}.collection = r.collection
                  AND {a}.id = r.id
                  AND {a}.field_name = ?{f}
                  AND {a}.{col} = ?{v})",
            a = alias,
            f = field_param,
            col = self.value.column(),
            v = value_param,
        )
    }
}

/// Orders records by an indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: &'static str,
    pub descending: bool,
}

impl Sort {
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// SQL `ORDER BY` term reading the field's value from `record_indexes`.
    ///
    /// A field only ever fills one typed column, so COALESCE picks it.
    pub(crate) fn to_order_term(&self, alias: &str, field_param: usize) -> String {
        format!(
            "(SELECT COALESCE({a}.field_value_str, {a}.field_value_int, {a}.field_value_bool)
              FROM record_indexes {a}
              WHERE {a}.collection = r.collection AND {a}.id = r.id AND {a}.field_name = ?{f}) {dir}",
            a = alias,
            f = field_param,
            dir = if self.descending { "DESC" } else { "ASC" },
        )
    }
}
