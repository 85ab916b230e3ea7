use std::marker::PhantomData;

use colored::*;
use prettytable::{format, Row, Table};

pub trait ToRow {
    fn columns() -> Row;
    fn to_row(&self) -> Row;
}

/// Table of one row type, titled with that type's columns
pub struct OutputTable<T: ToRow> {
    inner: Table,
    row_type: PhantomData<T>,
}

fn output_format() -> format::TableFormat {
    format::FormatBuilder::new()
        .padding(1, 1)
        .separator(
            format::LinePosition::Title,
            format::LineSeparator::new('-', '+', '+', '+'),
        )
        .build()
}

impl<T: ToRow> OutputTable<T> {
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut inner = Table::new();
        inner.set_format(output_format());
        inner.set_titles(T::columns());
        for row in rows {
            inner.add_row(row.to_row());
        }
        Self {
            inner,
            row_type: PhantomData,
        }
    }

    pub fn print(&self) {
        self.inner.printstd();
    }

    /// Print under a bold heading, followed by a blank line
    pub fn print_section(&self, heading: &str) {
        println!("{}", heading.bold());
        self.print();
        println!();
    }
}
