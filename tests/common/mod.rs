#![allow(dead_code)]

use entity_state_core::config::EntityConfig;
use entity_state_core::query_builder::Association;
use entity_state_core::registry::MethodRegistryBuilder;
use entity_state_core::{
    Entity, EntityContext, EntityRepository, EntityService, InMemoryExecutor, StateEntity,
    StateEntityService, StateMachineDefinition, StateRecordEntityService, StateTransitionRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ORDER_MACHINE: &str = "order-lifecycle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Pay,
    Ship,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<i64>,
    pub reference: String,
    pub total: i64,
    pub state: OrderState,
    pub note: Option<String>,
    pub customer: Option<Customer>,
}

impl Order {
    pub fn new(reference: &str, total: i64, customer: Option<(&str, &str)>) -> Self {
        Self {
            id: None,
            reference: reference.to_string(),
            total,
            state: OrderState::Pending,
            note: None,
            customer: customer.map(|(name, tier)| Customer {
                name: name.to_string(),
                tier: tier.to_string(),
            }),
        }
    }

    pub fn set_note(&mut self, note: String) -> &mut Self {
        self.note = Some(note);
        self
    }
}

impl Entity for Order {
    type Id = i64;

    const TABLE: &'static str = "orders";

    const FIELDS: &'static [&'static str] =
        &["id", "reference", "total", "state", "note", "customer"];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn association(name: &str) -> Option<Association> {
        match name {
            "customer" => Some(Association::new("customers", "customer_id", "id")),
            _ => None,
        }
    }

    fn declare_mutators(registry: MethodRegistryBuilder<Self>) -> MethodRegistryBuilder<Self> {
        registry
            .mutator("set_note", |order: &mut Order, note: String| {
                order.set_note(note);
            })
            .mutator("set_total", |order: &mut Order, total: i64| order.total = total)
    }
}

impl StateEntity for Order {
    type State = OrderState;

    fn state(&self) -> OrderState {
        self.state
    }

    fn set_state(&mut self, next: OrderState) -> &mut Self {
        self.state = next;
        self
    }
}

pub type OrderRecord = StateTransitionRecord<i64, OrderState>;

pub struct OrderService {
    repository: EntityRepository<Order>,
}

impl EntityService for OrderService {
    type Id = i64;
    type Entity = Order;

    fn repository(&self) -> &EntityRepository<Order> {
        &self.repository
    }
}

impl StateEntityService for OrderService {}

pub struct OrderRecordService {
    repository: EntityRepository<OrderRecord>,
}

impl EntityService for OrderRecordService {
    type Id = i64;
    type Entity = OrderRecord;

    fn repository(&self) -> &EntityRepository<OrderRecord> {
        &self.repository
    }
}

impl StateRecordEntityService for OrderRecordService {}

/// Pending -> Paid -> Shipped, with Cancel from Pending or Paid
pub struct OrderLifecycle;

impl StateMachineDefinition for OrderLifecycle {
    type State = OrderState;
    type Event = OrderEvent;

    fn initial(&self) -> OrderState {
        OrderState::Pending
    }

    fn transition(&self, from: &OrderState, event: &OrderEvent) -> Option<OrderState> {
        match (from, event) {
            (OrderState::Pending, OrderEvent::Pay) => Some(OrderState::Paid),
            (OrderState::Paid, OrderEvent::Ship) => Some(OrderState::Shipped),
            (OrderState::Pending | OrderState::Paid, OrderEvent::Cancel) => {
                Some(OrderState::Cancelled)
            }
            _ => None,
        }
    }
}

pub struct Fixture {
    pub context: EntityContext,
    pub order_store: InMemoryExecutor<Order>,
    pub record_store: InMemoryExecutor<OrderRecord>,
    pub orders: Arc<OrderService>,
    pub records: Arc<OrderRecordService>,
}

/// Orders 1..=3:
/// - A-100, 250, Ann (gold)
/// - A-101, 40, no customer
/// - B-200, 120, Bob (silver)
pub fn seeded_orders() -> Vec<Order> {
    vec![
        Order::new("A-100", 250, Some(("Ann", "gold"))),
        Order::new("A-101", 40, None),
        Order::new("B-200", 120, Some(("Bob", "silver"))),
    ]
}

pub fn fixture() -> Fixture {
    fixture_with(EntityConfig::default())
}

pub fn fixture_with(config: EntityConfig) -> Fixture {
    let context = EntityContext::new(config).expect("valid configuration");
    let order_store = InMemoryExecutor::with_rows(seeded_orders()).expect("seeded orders");
    let record_store = InMemoryExecutor::new();

    let orders = Arc::new(OrderService {
        repository: context
            .state_repository::<OrderService>(Arc::new(order_store.clone()))
            .expect("order repository"),
    });
    let records = Arc::new(OrderRecordService {
        repository: context
            .record_repository::<OrderRecordService>(Arc::new(record_store.clone()))
            .expect("record repository"),
    });

    Fixture {
        context,
        order_store,
        record_store,
        orders,
        records,
    }
}
