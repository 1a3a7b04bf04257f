//! Basic usage of the Quill query builder: declare tables, compose typed
//! combinators, and print the compiled SQL with its bind parameters.

use quill_core::{assign, count, insert_into, lit, query, ColumnAssignment, Result};

quill_core::table! {
    pub mod person => "person" {
        serial: i64 => "serial",
        name: String => "name",
        age: i64 => "age",
    }
}

quill_core::table! {
    pub mod address => "address" {
        name: String => "name",
        city: String => "city",
    }
}

fn main() -> Result<()> {
    // Filtered select with a stable output shape.
    let adults = query(|q| {
        let p = q.select(&person::table());
        q.restrict(p.age.clone().gt(lit(20i64)));
        q.order_by_asc(&p.name);
        (p.name, p.age)
    })?;
    println!("{}", adults.sql);
    println!("  params: {:?}", adults.params);

    // Left join: the right side decodes to null for unmatched rows.
    let with_city = query(|q| {
        let p = q.select(&person::table());
        let a = q.left_join(&address::table(), |a| a.name.clone().eq(p.name.clone()));
        (p.name, a.city)
    })?;
    println!("{}", with_city.sql);

    // Grouped aggregation, ordered by the count.
    let city_counts = query(|q| {
        let (name, cnt) = q.aggregate(|agg| {
            let addr = agg.select(&address::table());
            let name = agg.group_by(&addr.name);
            (name, count(addr.city))
        });
        q.order_by_desc(&cnt);
        (name, cnt)
    })?;
    println!("{}", city_counts.sql);

    // Insert with a database-side default and conflict handling.
    let insert = insert_into(person::table())
        .values(vec![
            ("serial", ColumnAssignment::Default),
            ("name", assign("Ada")),
            ("age", assign(36i64)),
        ])
        .on_conflict_do_nothing(&["serial"])
        .compile()?;
    println!("{}", insert.sql);
    println!("  params: {:?}", insert.params);

    Ok(())
}
