use datagate_core::{
    schema::{ModelDef, PropDef},
    stmt::{
        BinaryOp, ColumnRef, Direction, Filter, Join, Like, OrderBy, Select, SelectColumn,
        TableRef, Type, Value,
    },
    Manifest,
};
use datagate_sql::Serializer;
use pretty_assertions::assert_eq;

fn col(alias: &str, name: &str) -> ColumnRef {
    ColumnRef::new(alias, name)
}

fn serialize(serializer: Serializer, select: Select) -> (String, Vec<Value>) {
    let mut params = vec![];
    let sql = serializer.serialize(&select.into(), &mut params);
    (sql, params)
}

/// Cities joined to their country through a two-column key, filtered by a
/// name prefix and ordered both ways.
fn city_query() -> Select {
    let mut select = Select::new("City", "t0");
    select.joins.push(Join {
        table: TableRef {
            table: "Country".into(),
            alias: "t1".into(),
        },
        on: vec![
            (col("t0", "country.code"), col("t1", "code")),
            (col("t0", "country.year"), col("t1", "year")),
        ],
    });
    select.push_column(SelectColumn::Column(col("t0", "name"), Type::String));
    select.push_column(SelectColumn::Column(col("t1", "name"), Type::String));
    select.filter = Some(Filter::and([
        Filter::compare(col("t0", "population"), BinaryOp::Gt, Value::from(1000)),
        Filter::Like {
            column: col("t0", "name"),
            like: Like::StartsWith,
            value: "50%_".into(),
        },
    ]));
    select.order_by.push(OrderBy::new(col("t1", "name"), Direction::Asc));
    select.order_by.push(OrderBy::new(col("t0", "name"), Direction::Desc));
    select
}

#[test]
fn select_sqlite() {
    let (sql, params) = serialize(Serializer::sqlite(), city_query());
    assert_eq!(
        sql,
        "SELECT \"t0\".\"name\", \"t1\".\"name\" FROM \"City\" AS \"t0\" \
         LEFT JOIN \"Country\" AS \"t1\" \
         ON \"t0\".\"country.code\" = \"t1\".\"code\" AND \"t0\".\"country.year\" = \"t1\".\"year\" \
         WHERE (\"t0\".\"population\" > ?1 AND \"t0\".\"name\" LIKE ?2 ESCAPE '\\') \
         ORDER BY \"t1\".\"name\" ASC NULLS LAST, \"t0\".\"name\" DESC NULLS FIRST;"
    );
    assert_eq!(params, [Value::from(1000), Value::from("50\\%\\_%")]);
}

#[test]
fn select_postgresql() {
    let (sql, params) = serialize(Serializer::postgresql(), city_query());
    assert_eq!(
        sql,
        "SELECT \"t0\".\"name\", \"t1\".\"name\" FROM \"City\" AS \"t0\" \
         LEFT JOIN \"Country\" AS \"t1\" \
         ON \"t0\".\"country.code\" = \"t1\".\"code\" AND \"t0\".\"country.year\" = \"t1\".\"year\" \
         WHERE (\"t0\".\"population\" > $1 AND \"t0\".\"name\" ILIKE $2) \
         ORDER BY \"t1\".\"name\" ASC NULLS LAST, \"t0\".\"name\" DESC NULLS FIRST;"
    );
    assert_eq!(params, [Value::from(1000), Value::from("50\\%\\_%")]);
}

#[test]
fn json_keys_and_offsets() {
    let mut select = Select::new("Book", "t0");
    select.push_column(SelectColumn::Column(col("t0", "title").with_key("en"), Type::String));
    select.offset = Some(10);

    let (sql, params) = serialize(Serializer::postgresql(), select.clone());
    assert_eq!(
        sql,
        "SELECT (\"t0\".\"title\" ->> $1) FROM \"Book\" AS \"t0\" OFFSET 10;"
    );
    assert_eq!(params, [Value::from("en")]);

    let (sql, _) = serialize(Serializer::sqlite(), select);
    assert_eq!(
        sql,
        "SELECT json_extract(\"t0\".\"title\", ?1) FROM \"Book\" AS \"t0\" LIMIT -1 OFFSET 10;"
    );
}

fn manifest() -> Manifest {
    Manifest::builder()
        .model(
            ModelDef::new("Country")
                .prop(PropDef::new("code", "string").unique())
                .prop(PropDef::new("name", "string")),
        )
        .model(
            ModelDef::new("City")
                .prop(PropDef::new("name", "string"))
                .prop(PropDef::new("population", "integer"))
                .prop(PropDef::reference("country", "Country")),
        )
        .build()
        .unwrap()
}

#[test]
fn create_model_tables() {
    let manifest = manifest();
    let city = manifest.db.table("City").unwrap();
    let country = manifest.db.table("Country").unwrap();

    assert_eq!(
        Serializer::sqlite().serialize_create_table(city),
        "CREATE TABLE \"City\" (\"_id\" TEXT NOT NULL, \"_revision\" TEXT, \"name\" TEXT, \
         \"population\" INTEGER, \"country._id\" TEXT, PRIMARY KEY (\"_id\"), \
         FOREIGN KEY (\"country._id\") REFERENCES \"Country\" (\"_id\"));"
    );
    assert_eq!(
        Serializer::postgresql().serialize_create_table(city),
        "CREATE TABLE \"City\" (\"_id\" TEXT NOT NULL, \"_revision\" TEXT, \"name\" TEXT, \
         \"population\" BIGINT, \"country._id\" TEXT, PRIMARY KEY (\"_id\"), \
         FOREIGN KEY (\"country._id\") REFERENCES \"Country\" (\"_id\"));"
    );

    for serializer in [Serializer::sqlite(), Serializer::postgresql()] {
        assert_eq!(
            serializer.serialize_create_table(country),
            "CREATE TABLE \"Country\" (\"_id\" TEXT NOT NULL, \"_revision\" TEXT, \"code\" TEXT, \
             \"name\" TEXT, PRIMARY KEY (\"_id\"), UNIQUE (\"code\"));"
        );
    }
}

#[test]
fn create_changelog_table() {
    let manifest = manifest();
    let changelog = manifest.db.table("City/:changelog").unwrap();

    assert_eq!(
        Serializer::postgresql().serialize_create_table(changelog),
        "CREATE TABLE \"City/:changelog\" (\"_cid\" BIGSERIAL NOT NULL, \"_rid\" TEXT, \
         \"_revision\" TEXT, \"_op\" TEXT, \"_txn\" TEXT, \"_created\" TEXT, \"data\" JSONB, \
         PRIMARY KEY (\"_cid\"));"
    );
    assert_eq!(
        Serializer::sqlite().serialize_create_table(changelog),
        "CREATE TABLE \"City/:changelog\" (\"_cid\" INTEGER PRIMARY KEY AUTOINCREMENT, \
         \"_rid\" TEXT, \"_revision\" TEXT, \"_op\" TEXT, \"_txn\" TEXT, \"_created\" TEXT, \
         \"data\" TEXT);"
    );
}
