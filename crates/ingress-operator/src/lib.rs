/*
 * 5D Labs Ingress Operator - Dual-source Ingress Reconciliation
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Ingress operator core library
//!
//! This crate watches two representations of the same logical ingress (the
//! Voyager `Ingress` custom resource and the native `networking.k8s.io/v1`
//! `Ingress`), normalizes both into a canonical shape, and drives a per-key
//! finalizer/deletion state machine that delegates the actual provisioning
//! work to an external controller.

pub mod adapter;
pub mod canonical;
pub mod crds;
pub mod operator;

// Re-export commonly used types
pub use adapter::{ConversionError, CrdAdapter, NativeAdapter, SchemaAdapter};
pub use canonical::{CanonicalIngress, DiffResult, ValidationError};
pub use crds::{VoyagerIngress, VoyagerIngressSpec};
pub use operator::config::OperatorConfig;
pub use operator::types::{Error, ObjectKey, Result, FINALIZER_TOKEN};
pub use operator::{run_operator, OperatorContext};
