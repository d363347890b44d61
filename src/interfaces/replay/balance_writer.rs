use crate::domain::account::BalanceAccount;
use crate::error::Result;
use std::io::Write;

/// Writes the final balance sheet as CSV, one row per teacher.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: Vec<BalanceAccount>) -> Result<()> {
        self.writer.write_record([
            "teacher",
            "total_earnings",
            "available",
            "pending",
            "withdrawn",
        ])?;
        for account in accounts {
            self.writer.write_record([
                account.teacher.to_string(),
                account.total_earnings.to_string(),
                account.available.to_string(),
                account.pending.to_string(),
                account.withdrawn.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::CommissionRate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_writes_header_and_rows() {
        let teacher = Uuid::new_v4();
        let mut account = BalanceAccount::new(teacher, CommissionRate::new(dec!(20)).unwrap());
        account.credit("tx-1", dec!(1000)).unwrap();

        let mut out = Vec::new();
        BalanceWriter::new(&mut out)
            .write_accounts(vec![account])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("teacher,total_earnings,available,pending,withdrawn\n"));
        assert!(text.contains(&format!("{teacher},800,800,0,0")));
    }
}
