mod column_ref;
pub use column_ref::ColumnRef;

mod delete;
pub use delete::Delete;

mod direction;
pub use direction::{Direction, Nulls};

mod filter;
pub use filter::{BinaryOp, Filter, Like};

mod insert;
pub use insert::Insert;

mod order_by;
pub use order_by::OrderBy;

mod select;
pub use select::{Join, Select, SelectColumn, TableRef};

mod statement;
pub use statement::Statement;

mod ty;
pub use ty::Type;

mod update;
pub use update::Update;

mod value;
pub use value::Value;

mod value_cmp;

mod value_stream;
pub use value_stream::ValueStream;
