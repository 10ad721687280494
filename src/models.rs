use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Associations, Identifiable, Insertable, Queryable},
};

use crate::order::{ContactInfo, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};

// Orders

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: Option<i32>,
    pub full_name: String,
    pub email: String,
    pub address: String,
    pub status: String,
    pub total: i64,
    pub currency: String,
    pub gateway_order_ref: Option<String>,
    pub gateway_payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderEntity {
    pub fn status(&self) -> anyhow::Result<OrderStatus> {
        OrderStatus::from_str(&self.status)
            .with_context(|| format!("Order #{} has unknown status {:?}", self.id, self.status))
    }

    pub fn into_order(self, items: Vec<OrderItemEntity>) -> anyhow::Result<Order> {
        let status = self.status()?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            contact: ContactInfo {
                full_name: self.full_name,
                email: self.email,
                address: self.address,
            },
            status,
            total: self.total,
            currency: self.currency,
            gateway_order_ref: self.gateway_order_ref,
            gateway_payment_ref: self.gateway_payment_ref,
            items: items.into_iter().map(OrderItem::from).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: Option<i32>,
    pub full_name: String,
    pub email: String,
    pub address: String,
    pub status: String,
    pub total: i64,
    pub currency: String,
}

impl From<&NewOrder> for CreateOrderEntity {
    fn from(order: &NewOrder) -> Self {
        Self {
            user_id: order.user_id,
            full_name: order.contact.full_name.clone(),
            email: order.contact.email.clone(),
            address: order.contact.address.clone(),
            status: OrderStatus::Pending.to_string(),
            total: order.total(),
            currency: order.currency.clone(),
        }
    }
}

// Order items

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub product_id: String,
    pub title: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

impl From<OrderItemEntity> for OrderItem {
    fn from(item: OrderItemEntity) -> Self {
        Self {
            id: item.id,
            order_id: item.order_id,
            product_id: item.product_id,
            title: item.title,
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub product_id: String,
    pub title: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

impl CreateOrderItemEntity {
    pub fn new(order_id: i32, item: &NewOrderItem) -> Self {
        Self {
            order_id,
            product_id: item.product_id.clone(),
            title: item.title.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}
