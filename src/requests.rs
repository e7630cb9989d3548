//! Typed partner gateway calls.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::GatewayRequest;

/// Fetches the profile of the user behind the access token.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserInfoQuery;

impl UserInfoQuery {
    /// Gateway request path.
    pub const PATH: &'static str = "/api/user/oauth/info/query";
}

impl GatewayRequest for UserInfoQuery {
    fn path(&self) -> &str {
        Self::PATH
    }
}

/// Lists the bank cards bound to the user, optionally filtered.
#[derive(Clone, Debug, Default)]
pub struct BankCardQuery {
    pay_code: Option<String>,
    pay_type: Option<i64>,
}

impl BankCardQuery {
    /// Gateway request path.
    pub const PATH: &'static str = "/api/fund-pay/oauth/bank/card";

    /// Unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by payment channel code.
    pub fn with_pay_code(mut self, pay_code: impl Into<String>) -> Self {
        self.pay_code = Some(pay_code.into());
        self
    }

    /// Filters by payment type.
    pub fn with_pay_type(mut self, pay_type: i64) -> Self {
        self.pay_type = Some(pay_type);
        self
    }
}

impl GatewayRequest for BankCardQuery {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn data(&self) -> Option<Map<String, Value>> {
        let mut data = Map::new();
        if let Some(pay_code) = &self.pay_code {
            data.insert("pay_code".to_owned(), json!(pay_code));
        }
        if let Some(pay_type) = self.pay_type {
            data.insert("pay_type".to_owned(), json!(pay_type));
        }
        (!data.is_empty()).then_some(data)
    }
}

/// Sets the user's fund password.
#[derive(Clone)]
pub struct CreateFundPassword {
    password: String,
}

impl CreateFundPassword {
    /// Gateway request path.
    pub const PATH: &'static str = "/api/fund/oauth/password/create";

    /// Request setting `password`.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl fmt::Debug for CreateFundPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateFundPassword")
            .field("password", &"<redacted>")
            .finish()
    }
}

impl GatewayRequest for CreateFundPassword {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn data(&self) -> Option<Map<String, Value>> {
        let mut data = Map::new();
        data.insert("password".to_owned(), json!(self.password));
        Some(data)
    }
}
