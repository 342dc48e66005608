// SPDX-License-Identifier: Apache-2.0

pub(crate) mod admin_auth;
pub(crate) mod rate_limit;
pub(crate) mod request_tracing;
