//! Shared test harness for service and pipeline testing
//!
//! Provides `Order` (a tenant-scoped, concurrency-aware entity), its DTO and
//! mapper, `FaultyStore` (an `InMemoryStore` wrapper that counts calls and
//! injects failures) and a handful of spy handlers.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod harness;
//! use harness::*;
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scaffold::prelude::*;

// ---------------------------------------------------------------------------
// Order: entity, DTO and mapper
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub id: EntityId,
    pub tenant_id: Uuid,
    pub customer: String,
    pub total: i64,
    pub version: Option<VersionToken>,
    pub period: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Entity for Order {
    fn resource_name() -> &'static str {
        "orders"
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn version(&self) -> Option<&[u8]> {
        self.version.as_deref()
    }

    fn set_version(&mut self, version: VersionToken) {
        self.version = Some(version);
    }

    fn is_versioned() -> bool {
        true
    }

    fn set_valid_period(&mut self, valid_from: DateTime<Utc>, valid_to: DateTime<Utc>) {
        self.period = Some((valid_from, valid_to));
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Integer(self.id)),
            "customer" => Some(FieldValue::String(self.customer.clone())),
            "total" => Some(FieldValue::Integer(self.total)),
            "tenant_id" => Some(FieldValue::Uuid(self.tenant_id)),
            _ => None,
        }
    }

    fn tenant_id(&self) -> Option<Uuid> {
        Some(self.tenant_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDto {
    pub id: EntityId,
    pub tenant_id: Uuid,
    pub customer: String,
    pub total: i64,
    pub version: Option<VersionToken>,
}

impl Dto for OrderDto {
    fn id(&self) -> EntityId {
        self.id
    }

    fn version(&self) -> Option<&[u8]> {
        self.version.as_deref()
    }
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            tenant_id: order.tenant_id,
            customer: order.customer.clone(),
            total: order.total,
            version: order.version.clone(),
        }
    }
}

pub struct OrderMapper;

impl DtoMapper<Order, OrderDto> for OrderMapper {
    fn to_dto(&self, entity: &Order) -> OrderDto {
        OrderDto::from(entity)
    }

    fn to_new_entity(&self, dto: &OrderDto) -> Order {
        Order {
            id: 0,
            tenant_id: dto.tenant_id,
            customer: dto.customer.clone(),
            total: dto.total,
            version: None,
            period: None,
        }
    }

    fn apply(&self, dto: &OrderDto, entity: &mut Order) {
        entity.customer = dto.customer.clone();
        entity.total = dto.total;
    }
}

pub fn tenant_a() -> Uuid {
    Uuid::from_u128(0xA)
}

pub fn tenant_b() -> Uuid {
    Uuid::from_u128(0xB)
}

pub fn new_order(tenant_id: Uuid, customer: &str, total: i64) -> OrderDto {
    OrderDto {
        id: 0,
        tenant_id,
        customer: customer.to_string(),
        total,
        version: None,
    }
}

pub fn user(tenant_id: Uuid, roles: &[&str]) -> AuthContext {
    AuthContext::User {
        user_id: Uuid::new_v4(),
        tenant_id,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

/// Install a test subscriber once; `RUST_LOG` controls the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// FaultyStore: counting, fault-injecting store
// ---------------------------------------------------------------------------

/// Failure injected into the next `save`
#[derive(Debug, Clone)]
pub enum Fault {
    Concurrency,
    Database { code: String, message: String },
    Unexpected(String),
}

#[derive(Default)]
pub struct Calls {
    pub fetch: AtomicUsize,
    pub count: AtomicUsize,
    pub save: AtomicUsize,
    pub pending_migrations: AtomicUsize,
}

impl Calls {
    pub fn fetches(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.save.load(Ordering::SeqCst)
    }

    pub fn migration_checks(&self) -> usize {
        self.pending_migrations.load(Ordering::SeqCst)
    }
}

pub struct FaultyStore {
    pub inner: InMemoryStore<Order>,
    pub calls: Calls,
    fault: Mutex<Option<Fault>>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::wrap(InMemoryStore::new())
    }

    pub fn wrap(inner: InMemoryStore<Order>) -> Self {
        Self {
            inner,
            calls: Calls::default(),
            fault: Mutex::new(None),
            fetch_delay: Mutex::new(None),
        }
    }

    pub fn fail_next_save(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    pub fn delay_fetches(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn rows(&self) -> Vec<Order> {
        self.inner.snapshot().unwrap()
    }

    /// Insert directly, bypassing every service
    pub async fn seed(&self, orders: Vec<OrderDto>) -> Vec<Order> {
        let mut changes = ChangeSet::new();
        for dto in &orders {
            changes.insert(OrderMapper.to_new_entity(dto));
        }
        self.inner.save(changes).await.unwrap()
    }
}

#[async_trait]
impl SchemaStatus for FaultyStore {
    async fn pending_migrations(&self) -> Result<Vec<String>, StoreError> {
        self.calls.pending_migrations.fetch_add(1, Ordering::SeqCst);
        self.inner.pending_migrations().await
    }
}

#[async_trait]
impl EntityStore<Order> for FaultyStore {
    async fn fetch(&self, query: &Query<Order>) -> Result<Vec<Order>, StoreError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.fetch(query).await
    }

    async fn count(&self, query: &Query<Order>) -> Result<usize, StoreError> {
        self.calls.count.fetch_add(1, Ordering::SeqCst);
        self.inner.count(query).await
    }

    async fn save(&self, changes: ChangeSet<Order>) -> Result<Vec<Order>, StoreError> {
        self.calls.save.fetch_add(1, Ordering::SeqCst);
        let fault = self.fault.lock().unwrap().take();
        match fault {
            Some(Fault::Concurrency) => Err(StoreError::Concurrency),
            Some(Fault::Database { code, message }) => Err(StoreError::Database { code, message }),
            Some(Fault::Unexpected(message)) => Err(StoreError::Other(anyhow::anyhow!(message))),
            None => self.inner.save(changes).await,
        }
    }
}

pub type OrderService = CrudService<Order, OrderDto, FaultyStore, OrderMapper>;

pub fn service(store: Arc<FaultyStore>, handlers: HandlerSet<Order, OrderDto>) -> OrderService {
    CrudService::new(store, Arc::new(OrderMapper), handlers, PipelineState::shared())
}

/// Every current row as a list request, ordered by id
pub fn all_orders(count: bool) -> GetListRequest<OrderDto, Order> {
    ListQueryBuilder::new(1000).build(
        &ListQuery::new().order_by(|a: &Order, b: &Order| a.id.cmp(&b.id)),
        |order: &Order| OrderDto::from(order),
        count,
    )
}

pub fn expect_success<T: std::fmt::Debug>(result: Result<Outcome<T>, PipelineError>) -> T {
    match result {
        Ok(Outcome::Success(value)) => value,
        other => panic!("Expected success, got {:?}", other),
    }
}

pub fn expect_failure<T: std::fmt::Debug>(result: Result<Outcome<T>, PipelineError>) -> Problem {
    match result {
        Ok(Outcome::Failure(problem)) => problem,
        other => panic!("Expected failure outcome, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Spy handlers
// ---------------------------------------------------------------------------

/// Shared log of handler invocations, in call order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Records every create/get_single/get_list/delete call and optionally
/// rejects requests with a fixed status
pub struct SpyHandler {
    pub name: &'static str,
    pub log: CallLog,
    pub reject: Option<StatusCode>,
}

impl SpyHandler {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            reject: None,
        }
    }

    pub fn rejecting(name: &'static str, log: &CallLog, status: StatusCode) -> Self {
        Self {
            reject: Some(status),
            ..Self::new(name, log)
        }
    }

    fn record(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, event));
    }

    fn request<P>(&self, event: &str, previous: Authorization<P, Order>) -> Authorization<P, Order> {
        self.record(event);
        match self.reject {
            Some(status) => previous.with_status(status),
            None => previous,
        }
    }
}

#[async_trait]
impl AuthorizationHandler<Order, OrderDto> for SpyHandler {
    async fn handle_get_single_request(
        &self,
        previous: Authorization<EntityId, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<EntityId, Order> {
        self.request("get_single_request", previous)
    }

    async fn handle_get_single_response(
        &self,
        previous: Outcome<OrderDto>,
        _cancel: &CancellationToken,
    ) -> Outcome<OrderDto> {
        self.record("get_single_response");
        previous
    }

    async fn handle_get_list_request(
        &self,
        previous: Authorization<GetListRequest<OrderDto, Order>, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<GetListRequest<OrderDto, Order>, Order> {
        self.request("get_list_request", previous)
    }

    async fn handle_get_list_response(
        &self,
        previous: Outcome<ListPage<OrderDto>>,
        _cancel: &CancellationToken,
    ) -> Outcome<ListPage<OrderDto>> {
        self.record("get_list_response");
        previous
    }

    async fn handle_create_request(
        &self,
        previous: Authorization<OrderDto, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<OrderDto, Order> {
        self.request("create_request", previous)
    }

    async fn handle_create_response(
        &self,
        previous: Outcome<OrderDto>,
        _cancel: &CancellationToken,
    ) -> Outcome<OrderDto> {
        self.record("create_response");
        previous
    }

    async fn handle_delete_request(
        &self,
        previous: Authorization<DeleteRequest, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<DeleteRequest, Order> {
        self.request("delete_request", previous)
    }

    async fn handle_delete_response(
        &self,
        previous: Outcome<()>,
        _cancel: &CancellationToken,
    ) -> Outcome<()> {
        self.record("delete_response");
        previous
    }
}

/// Overrides nothing
pub struct IdentityHandler;

impl AuthorizationHandler<Order, OrderDto> for IdentityHandler {}

/// Hides rows failing `visible` from every read and write lookup
pub struct RowVisibility {
    visible: Arc<dyn Fn(&Order) -> bool + Send + Sync>,
}

impl RowVisibility {
    pub fn new(visible: impl Fn(&Order) -> bool + Send + Sync + 'static) -> Self {
        Self {
            visible: Arc::new(visible),
        }
    }

    fn narrow<P>(&self, previous: Authorization<P, Order>) -> Authorization<P, Order> {
        let visible = Arc::clone(&self.visible);
        previous.with_filter(move |query: Query<Order>| {
            let visible = Arc::clone(&visible);
            query.filter(move |row: &Order| visible(row))
        })
    }
}

#[async_trait]
impl AuthorizationHandler<Order, OrderDto> for RowVisibility {
    async fn handle_get_single_request(
        &self,
        previous: Authorization<EntityId, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<EntityId, Order> {
        self.narrow(previous)
    }

    async fn handle_get_list_request(
        &self,
        previous: Authorization<GetListRequest<OrderDto, Order>, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<GetListRequest<OrderDto, Order>, Order> {
        self.narrow(previous)
    }

    async fn handle_update_many_request(
        &self,
        previous: Authorization<UpdateMultipleRequest<OrderDto, Order>, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<UpdateMultipleRequest<OrderDto, Order>, Order> {
        self.narrow(previous)
    }

    async fn handle_delete_request(
        &self,
        previous: Authorization<DeleteRequest, Order>,
        _cancel: &CancellationToken,
    ) -> Authorization<DeleteRequest, Order> {
        self.narrow(previous)
    }
}

/// Write hooks that record calls and can fail on demand
#[derive(Default)]
pub struct RecordingHooks {
    pub log: CallLog,
    pub fail_before_create: bool,
}

#[async_trait]
impl WriteHooks<Order, OrderDto> for RecordingHooks {
    async fn before_create(&self, entities: &mut [Order], _dtos: &[OrderDto]) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("before_create:{}", entities.len()));
        if self.fail_before_create {
            anyhow::bail!("hook refused the insert");
        }
        for entity in entities.iter_mut() {
            entity.customer = entity.customer.to_uppercase();
        }
        Ok(())
    }

    async fn after_create(&self, entities: &[Order], _dtos: &mut [OrderDto]) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("after_create:{}", entities.len()));
        Ok(())
    }

    async fn before_update(&self, entities: &mut [Order], _dtos: &[OrderDto]) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("before_update:{}", entities.len()));
        Ok(())
    }

    async fn after_update(&self, entities: &[Order], _dtos: &mut [OrderDto]) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("after_update:{}", entities.len()));
        Ok(())
    }

    async fn before_delete(&self, entity: &Order) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("before_delete:{}", entity.id));
        Ok(())
    }

    async fn after_delete(&self, entity: &Order) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("after_delete:{}", entity.id));
        Ok(())
    }
}
