use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::services::TripKey;

/// A confirmed seat assignment. Rows are inserted by the allocation engine
/// and deleted on cancellation; they are never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservation")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub bus_id: String,
    pub seat_number: i32,
    #[serde(rename = "date")]
    pub trip_date: Date,
    #[serde(rename = "time")]
    pub departure_time: String,
    pub departure_location: String,
    pub arrival_location: String,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn trip_key(&self) -> TripKey {
        TripKey {
            bus_id: self.bus_id.clone(),
            date: self.trip_date,
            time: self.departure_time.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bus::Entity",
        from = "Column::BusId",
        to = "super::bus::Column::Id"
    )]
    Bus,
}

impl Related<super::bus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
