//! Fixture entities.
//!
//! A small customer/order model covering every mapping shape the core
//! handles: identity keys, a one-to-many and a one-to-one navigation, a
//! composite key and a keyless entity.

use entimap_codec::{CodecResult, FromValue, Value};
use entimap_core::{
    Catalog, ColumnDescriptor, Entity, EntityDescriptor, NavigationDescriptor, Record,
};
use std::sync::OnceLock;
use uuid::Uuid;

/// A customer with an identity key, orders and an optional address.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    /// Database-assigned key.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Optional contact address.
    pub email: Option<String>,
    /// Orders placed by the customer.
    pub orders: Vec<Order>,
    /// Shipping address.
    pub address: Option<Address>,
}

impl Customer {
    /// A new, unsaved customer.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Customer {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new("Customer")
                .table("Customers")
                .column(ColumnDescriptor::new("Id").identity())
                .column(ColumnDescriptor::new("Name"))
                .column(ColumnDescriptor::new("Email"))
                .navigation(NavigationDescriptor::many("Orders", "Order"))
                .navigation(NavigationDescriptor::one("Address", "Address"))
                .navigation(NavigationDescriptor::many("Audit", "AuditEntry"))
        })
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "Name" => Some(self.name.as_str().into()),
            "Email" => Some(self.email.as_deref().map_or(Value::Null, Value::from)),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
        match property {
            "Id" => self.id = i64::from_value(value)?,
            "Name" => self.name = String::from_value(value)?,
            "Email" => self.email = Option::<String>::from_value(value)?,
            _ => {}
        }
        Ok(())
    }

    fn attach(&mut self, navigation: &str, related: &Record) -> CodecResult<()> {
        match navigation {
            "Orders" => self.orders.push(Order::from_record(related)?),
            "Address" => self.address = Some(Address::from_record(related)?),
            _ => {}
        }
        Ok(())
    }
}

/// An order belonging to a customer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    /// Database-assigned key.
    pub id: i64,
    /// Owning customer.
    pub customer_id: i64,
    /// Order total.
    pub total: f64,
}

impl Entity for Order {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new("Order")
                .table("Orders")
                .column(ColumnDescriptor::new("Id").identity())
                .column(ColumnDescriptor::new("CustomerId").references("Customer"))
                .column(ColumnDescriptor::new("Total"))
        })
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "CustomerId" => Some(self.customer_id.into()),
            "Total" => Some(self.total.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
        match property {
            "Id" => self.id = i64::from_value(value)?,
            "CustomerId" => self.customer_id = i64::from_value(value)?,
            "Total" => self.total = f64::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// A customer's address, keyed by a caller-assigned id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
    /// Caller-assigned key.
    pub id: i64,
    /// Owning customer.
    pub customer_id: i64,
    /// City name.
    pub city: String,
}

impl Entity for Address {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new("Address")
                .column(ColumnDescriptor::new("Id").primary_key())
                .column(ColumnDescriptor::new("CustomerId"))
                .column(ColumnDescriptor::new("City").column("CityName"))
        })
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Id" => Some(self.id.into()),
            "CustomerId" => Some(self.customer_id.into()),
            "City" => Some(self.city.as_str().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
        match property {
            "Id" => self.id = i64::from_value(value)?,
            "CustomerId" => self.customer_id = i64::from_value(value)?,
            "City" => self.city = String::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// A label with a composite `(Name, Scope)` key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tag {
    /// First key part.
    pub name: String,
    /// Second key part.
    pub scope: String,
    /// Display color.
    pub color: String,
}

impl Tag {
    /// Builds a tag.
    pub fn new(name: &str, scope: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: scope.to_string(),
            color: color.to_string(),
        }
    }
}

impl Entity for Tag {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new("Tag")
                .column(ColumnDescriptor::new("Name").primary_key())
                .column(ColumnDescriptor::new("Scope").primary_key())
                .column(ColumnDescriptor::new("Color"))
        })
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Name" => Some(self.name.as_str().into()),
            "Scope" => Some(self.scope.as_str().into()),
            "Color" => Some(self.color.as_str().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
        match property {
            "Name" => self.name = String::from_value(value)?,
            "Scope" => self.scope = String::from_value(value)?,
            "Color" => self.color = String::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// A keyless log entry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuditEntry {
    /// Correlation id of the request that wrote the entry.
    pub correlation: Uuid,
    /// Customer the entry is about.
    pub customer_id: i64,
    /// Free text.
    pub message: String,
}

impl Entity for AuditEntry {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: OnceLock<EntityDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new("AuditEntry")
                .table("AuditLog")
                .column(ColumnDescriptor::new("Correlation"))
                .column(ColumnDescriptor::new("CustomerId"))
                .column(ColumnDescriptor::new("Message"))
        })
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "Correlation" => Some(self.correlation.into()),
            "CustomerId" => Some(self.customer_id.into()),
            "Message" => Some(self.message.as_str().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: &Value) -> CodecResult<()> {
        match property {
            "Correlation" => self.correlation = Uuid::from_value(value)?,
            "CustomerId" => self.customer_id = i64::from_value(value)?,
            "Message" => self.message = String::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Catalog holding every fixture entity.
pub fn catalog() -> Catalog {
    Catalog::new()
        .with::<Customer>()
        .with::<Order>()
        .with::<Address>()
        .with::<Tag>()
        .with::<AuditEntry>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_record_round_trips_nullable_email() {
        let customer = Customer {
            id: 3,
            name: "Ann".into(),
            email: None,
            ..Customer::default()
        };
        let record = customer.to_record();
        assert_eq!(record.value("Email"), Value::Null);

        let back = Customer::from_record(&record.with("Email", "ann@example.com")).unwrap();
        assert_eq!(back.id, 3);
        assert_eq!(back.email.as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn catalog_registers_every_fixture() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.contains("AuditEntry"));
    }
}
