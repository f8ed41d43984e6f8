//! Command submission: invoke, query, deploy, batch pin, network
//! action.
//!
//! Command bodies share one shape: a `headers.type` discriminator, a
//! positional `params` array built from the parsed method signature
//! and the caller's named arguments, the target (`to`) or constructor
//! payload, and caller options merged verbatim. Option keys that
//! collide with protocol fields are rejected outright.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use evmbridge_abi::batchpin::{
    self, custom_pin_params, network_action_method_abi, pin_batch_method_abi, pin_batch_params,
};
use evmbridge_abi::encode::coerce_arg;
use evmbridge_abi::interface::ParsedMethod;
use evmbridge_core::error::{ConnectorError, SubmissionError};
use evmbridge_core::location::ContractLocation;
use evmbridge_core::types::BatchPin;

use crate::client::GatewayClient;
use crate::version::NetworkVersionCache;
use crate::wire::GatewayFault;

/// Keys that collide with protocol fields and may not appear in caller
/// options.
const RESERVED_OPTIONS: &[&str] = &[
    "headers",
    "from",
    "to",
    "method",
    "params",
    "contract",
    "definition",
];

/// Submission operations against the gateway command endpoint.
pub struct TransactionOps {
    client: Arc<GatewayClient>,
    versions: Arc<NetworkVersionCache>,
}

impl TransactionOps {
    pub fn new(client: Arc<GatewayClient>, versions: Arc<NetworkVersionCache>) -> Self {
        Self { client, versions }
    }

    pub fn versions(&self) -> &Arc<NetworkVersionCache> {
        &self.versions
    }

    /// Submit a contract invocation. When `batch` is present the call
    /// is a pinned transaction and the negotiated network version
    /// selects the pin wire format.
    pub async fn invoke_contract(
        &self,
        ns_op_id: &str,
        signing_key: &str,
        location: &Value,
        method: &ParsedMethod,
        args: &Map<String, Value>,
        options: &Map<String, Value>,
        batch: Option<&BatchPin>,
    ) -> Result<(), SubmissionError> {
        let location = ContractLocation::parse(location).map_err(SubmissionError::rejected)?;

        let mut params = positional_args(method, args).map_err(SubmissionError::rejected)?;
        if let Some(batch) = batch {
            let version = self
                .versions
                .get(&location.to_value())
                .await
                .map_err(SubmissionError::from)?;
            params.extend(custom_pin_params(method, version, batch).map_err(SubmissionError::rejected)?);
        }

        let mut body = command_body("SendTransaction", ns_op_id);
        body.insert("from".into(), json!(signing_key));
        body.insert("to".into(), json!(location.address));
        body.insert("method".into(), method.abi_json());
        body.insert("params".into(), Value::Array(params));
        merge_options(&mut body, options).map_err(SubmissionError::rejected)?;

        debug!(method = %method.name, to = %location.address, "invoking contract");
        self.send(Value::Object(body)).await
    }

    /// Run a read-only call and normalize the output into one JSON
    /// object.
    pub async fn query_contract(
        &self,
        signing_key: &str,
        location: &Value,
        method: &ParsedMethod,
        args: &Map<String, Value>,
        options: &Map<String, Value>,
    ) -> Result<Value, ConnectorError> {
        let location = ContractLocation::parse(location)?;
        let params = positional_args(method, args)?;

        let mut body = command_body("Query", "");
        if !signing_key.is_empty() {
            body.insert("from".into(), json!(signing_key));
        }
        body.insert("to".into(), json!(location.address));
        body.insert("method".into(), method.abi_json());
        body.insert("params".into(), Value::Array(params));
        merge_options(&mut body, options)?;

        let output = self
            .client
            .post_command(&Value::Object(body))
            .await
            .map_err(GatewayFault::into_error)?;

        // The gateway returns either a single unnamed `output` field or
        // a map of named outputs; both normalize to one object.
        match output {
            Value::Object(map) => Ok(Value::Object(map)),
            other => Err(ConnectorError::Decode {
                reason: format!("cannot unmarshal query response: {other}"),
            }),
        }
    }

    /// Deploy a contract from its ABI definition and bytecode.
    pub async fn deploy_contract(
        &self,
        ns_op_id: &str,
        signing_key: &str,
        definition: Value,
        contract: Value,
        input: Vec<Value>,
        options: &Map<String, Value>,
    ) -> Result<(), SubmissionError> {
        let mut body = command_body("DeployContract", ns_op_id);
        body.insert("from".into(), json!(signing_key));
        body.insert("definition".into(), definition);
        body.insert("contract".into(), contract);
        body.insert("params".into(), Value::Array(input));
        merge_options(&mut body, options).map_err(SubmissionError::rejected)?;

        self.send(Value::Object(body)).await
    }

    /// Submit a batch pin through the reserved contract.
    pub async fn submit_batch_pin(
        &self,
        ns_op_id: &str,
        namespace: &str,
        signing_key: &str,
        batch: &BatchPin,
        location: &Value,
    ) -> Result<(), SubmissionError> {
        let location = ContractLocation::parse(location).map_err(SubmissionError::rejected)?;
        let version = self
            .versions
            .get(&location.to_value())
            .await
            .map_err(SubmissionError::from)?;

        let mut body = command_body("SendTransaction", ns_op_id);
        body.insert("from".into(), json!(signing_key));
        body.insert("to".into(), json!(location.address));
        body.insert("method".into(), pin_batch_method_abi(version));
        body.insert(
            "params".into(),
            Value::Array(pin_batch_params(version, namespace, batch)),
        );

        debug!(namespace, version, "submitting batch pin");
        self.send(Value::Object(body)).await
    }

    /// Submit a network control action through the reserved contract.
    pub async fn submit_network_action(
        &self,
        ns_op_id: &str,
        signing_key: &str,
        action: &str,
        location: &Value,
    ) -> Result<(), SubmissionError> {
        let location = ContractLocation::parse(location).map_err(SubmissionError::rejected)?;
        let version = self
            .versions
            .get(&location.to_value())
            .await
            .map_err(SubmissionError::from)?;

        let mut body = command_body("SendTransaction", ns_op_id);
        body.insert("from".into(), json!(signing_key));
        body.insert("to".into(), json!(location.address));

        if version >= 2 {
            body.insert("method".into(), network_action_method_abi());
            body.insert(
                "params".into(),
                json!([format!("{}{}", batchpin::NETWORK_ACTION_PREFIX, action), ""]),
            );
        } else {
            // Version-1 deployments multiplex actions through the pin
            // method with zeroed pin fields.
            let zeroed = BatchPin {
                transaction_id: Uuid::nil(),
                batch_id: Uuid::nil(),
                batch_hash: evmbridge_core::types::Bytes32::ZERO,
                payload_ref: String::new(),
                contexts: vec![],
            };
            let marker = format!("{}{}", batchpin::NETWORK_ACTION_PREFIX, action);
            body.insert("method".into(), pin_batch_method_abi(1));
            body.insert(
                "params".into(),
                Value::Array(pin_batch_params(1, &marker, &zeroed)),
            );
        }

        self.send(Value::Object(body)).await
    }

    async fn send(&self, body: Value) -> Result<(), SubmissionError> {
        match self.client.post_command(&body).await {
            Ok(_) => Ok(()),
            Err(fault) => {
                let rejected = fault.submission_rejected();
                let source = fault.into_error();
                Err(SubmissionError { source, rejected })
            }
        }
    }
}

fn command_body(header_type: &str, ns_op_id: &str) -> Map<String, Value> {
    let id = if ns_op_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        ns_op_id.to_string()
    };
    let mut body = Map::new();
    body.insert("headers".into(), json!({ "id": id, "type": header_type }));
    body
}

/// Build the positional parameter array from named arguments, in
/// declared order. Arguments are shape-checked against the ABI types;
/// missing arguments pass through as null for the gateway to reject
/// with full context.
fn positional_args(
    method: &ParsedMethod,
    args: &Map<String, Value>,
) -> Result<Vec<Value>, ConnectorError> {
    method
        .params
        .iter()
        .map(|param| match args.get(&param.name) {
            Some(value) => coerce_arg(param, value),
            None => Ok(Value::Null),
        })
        .collect()
}

/// Merge caller options into the body verbatim, rejecting keys that
/// collide with protocol fields.
fn merge_options(
    body: &mut Map<String, Value>,
    options: &Map<String, Value>,
) -> Result<(), ConnectorError> {
    for (key, value) in options {
        if RESERVED_OPTIONS.contains(&key.as_str()) || body.contains_key(key) {
            return Err(ConnectorError::ReservedOption { key: key.clone() });
        }
        body.insert(key.clone(), value.clone());
    }
    Ok(())
}
