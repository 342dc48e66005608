// SPDX-License-Identifier: Apache-2.0

pub(crate) mod rate_limiter;
pub(crate) mod redis_backend;
