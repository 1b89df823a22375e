//! Bridge from serde_json values to sqlx bind parameters.
//!
//! Values bind in their natural JSON shape; column typing comes from the
//! `$n::type` cast the builder renders into the statement, so strings
//! destined for uuid or temporal columns bind as text and convert
//! server-side.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

#[derive(Clone, Debug)]
pub enum SqlParam {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Json(Value),
}

impl SqlParam {
    pub fn from_json(v: &Value) -> SqlParam {
        match v {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlParam::I64(i),
                None => SqlParam::F64(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => SqlParam::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlParam::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for SqlParam {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            SqlParam::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            SqlParam::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            SqlParam::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            SqlParam::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            SqlParam::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            SqlParam::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for SqlParam {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
