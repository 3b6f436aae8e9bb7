use super::Connection;
use crate::error::{MysqlError, Result};
use crate::native::NativeResultSet;
use crate::types::Field;
use std::marker::PhantomData;

/// One fetched row. `None` marks a SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: Vec<Option<Vec<u8>>>,
}

impl Row {
    pub fn new(values: Vec<Option<Vec<u8>>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column bytes; `None` for NULL or an index past the last column.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values.get(index)?.as_deref()
    }

    /// Column as UTF-8 text, `None` for NULL or invalid UTF-8.
    pub fn get_str(&self, index: usize) -> Option<&str> {
        std::str::from_utf8(self.get(index)?).ok()
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    pub fn values(&self) -> &[Option<Vec<u8>>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<Vec<u8>>> {
        self.values
    }
}

impl From<Vec<Option<Vec<u8>>>> for Row {
    fn from(values: Vec<Option<Vec<u8>>>) -> Self {
        Self::new(values)
    }
}

/// A fully buffered text-query result.
///
/// Holds no rows when the statement did not produce a result set; fetching
/// from such a result fails with [`MysqlError::NoFetchableData`] while the
/// counters report zero.
pub struct QueryResult<'c> {
    native: Option<Box<dyn NativeResultSet>>,
    _connection: PhantomData<&'c Connection>,
}

impl<'c> QueryResult<'c> {
    pub(crate) fn new(native: Option<Box<dyn NativeResultSet>>) -> Self {
        Self {
            native,
            _connection: PhantomData,
        }
    }

    fn fetchable(&mut self, operation: &str) -> Result<&mut Box<dyn NativeResultSet>> {
        self.native.as_mut().ok_or_else(|| {
            MysqlError::NoFetchableData(format!(
                "Mysql.{operation}: result did not return fetchable data"
            ))
        })
    }

    /// Next row, or `None` once every row has been returned.
    pub fn fetch(&mut self) -> Result<Option<Row>> {
        let native = self.fetchable("fetch")?;
        if native.num_fields() == 0 {
            return Err(MysqlError::NoFetchableData(
                "Mysql.fetch: no columns".to_string(),
            ));
        }
        Ok(native.fetch_row().map(|values| {
            Row::new(values.into_iter().map(|v| v.map(<[u8]>::to_vec)).collect())
        }))
    }

    /// Moves the cursor to the 0-based row `offset`.
    pub fn seek(&mut self, offset: i64) -> Result<()> {
        let native = self.fetchable("to_row")?;
        let rows = native.num_rows();
        match u64::try_from(offset) {
            Ok(offset) if offset < rows => {
                native.data_seek(offset);
                Ok(())
            }
            _ => Err(MysqlError::InvalidArgument(
                "Mysql.to_row: offset out of range".to_string(),
            )),
        }
    }

    pub fn is_fetchable(&self) -> bool {
        self.native.is_some()
    }

    pub fn row_count(&self) -> u64 {
        self.native.as_ref().map_or(0, |n| n.num_rows())
    }

    pub fn column_count(&self) -> usize {
        self.native.as_ref().map_or(0, |n| n.num_fields())
    }

    pub fn field_at(&self, index: usize) -> Option<Field> {
        self.native
            .as_ref()?
            .fetch_field_direct(index)
            .map(Field::from)
    }

    /// All column descriptors, `None` when the result has no columns.
    pub fn fields(&self) -> Option<Vec<Field>> {
        let fields = self.native.as_ref()?.fetch_fields();
        if fields.is_empty() {
            return None;
        }
        Some(fields.into_iter().map(Field::from).collect())
    }

    /// Advances the per-result field cursor.
    pub fn next_field(&mut self) -> Option<Field> {
        self.native.as_mut()?.fetch_field().map(Field::from)
    }

    pub fn rows(&mut self) -> Rows<'_, 'c> {
        Rows {
            result: self,
            done: false,
        }
    }

    /// Releases the buffered rows now. Later fetches fail as for a non-row result.
    pub fn free(&mut self) {
        self.native = None;
    }
}

impl std::fmt::Debug for QueryResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("fetchable", &self.is_fetchable())
            .field("rows", &self.row_count())
            .field("columns", &self.column_count())
            .finish()
    }
}

/// Iterator over the remaining rows of a [`QueryResult`]. Stops after the first error.
pub struct Rows<'r, 'c> {
    result: &'r mut QueryResult<'c>,
    done: bool,
}

impl Iterator for Rows<'_, '_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.result.fetch() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::codes;
    use crate::native::scripted::{ScriptedDriver, ScriptedTable};
    use crate::native::NativeDriver;
    use crate::config::ConnectTarget;

    fn stored(table: ScriptedTable) -> QueryResult<'static> {
        let driver = ScriptedDriver::new();
        driver.on_query(
            "SELECT * FROM t",
            crate::native::scripted::QueryOutcome::Rows(table),
        );
        let mut conn = driver.init().unwrap();
        conn.real_connect(&ConnectTarget::new(), 0).unwrap();
        conn.real_query(b"SELECT * FROM t").unwrap();
        QueryResult::new(conn.store_result().unwrap())
    }

    fn three_rows() -> ScriptedTable {
        ScriptedTable::new(&[("id", codes::TYPE_LONG), ("name", codes::TYPE_VAR_STRING)])
            .with_row([Some("1"), Some("ann")])
            .with_row([Some("2"), None])
            .with_row([Some("3"), Some("")])
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![Some(b"1".to_vec()), None, Some(Vec::new())]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get_str(0), Some("1"));
        assert!(row.is_null(1));
        assert!(!row.is_null(2));
        assert_eq!(row.get(2), Some(&b""[..]));
        assert_eq!(row.get(3), None);
        assert!(!row.is_null(3));
    }

    #[test]
    fn test_fetch_until_exhausted() {
        let mut result = stored(three_rows());
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.column_count(), 2);
        let mut seen = 0;
        while let Some(row) = result.fetch().unwrap() {
            assert_eq!(row.len(), 2);
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert_eq!(result.fetch().unwrap(), None);
    }

    #[test]
    fn test_seek_matches_sequential_fetch() {
        let mut result = stored(three_rows());
        let sequential: Vec<Row> = result.rows().collect::<Result<_>>().unwrap();
        for (k, expected) in sequential.iter().enumerate() {
            result.seek(k as i64).unwrap();
            assert_eq!(result.fetch().unwrap().as_ref(), Some(expected));
        }
    }

    #[test]
    fn test_seek_out_of_range() {
        let mut result = stored(three_rows());
        for offset in [-1, 3, i64::MAX] {
            assert!(matches!(
                result.seek(offset),
                Err(MysqlError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_non_fetchable_result() {
        let mut result = QueryResult::new(None);
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.column_count(), 0);
        assert!(result.fields().is_none());
        assert!(result.field_at(0).is_none());
        assert!(result.next_field().is_none());
        let err = result.fetch().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Mysql.fetch: result did not return fetchable data"
        );
        assert!(matches!(result.seek(0), Err(MysqlError::NoFetchableData(_))));
    }

    #[test]
    fn test_zero_column_result_cannot_fetch() {
        let mut result = stored(ScriptedTable::new(&[]));
        assert_eq!(
            result.fetch().unwrap_err(),
            MysqlError::NoFetchableData("Mysql.fetch: no columns".to_string())
        );
        assert!(result.fields().is_none());
    }

    #[test]
    fn test_field_cursor_and_direct_access() {
        let mut result = stored(three_rows());
        let fields = result.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].name, "name");
        assert_eq!(fields[1].max_length, 3);
        assert_eq!(result.field_at(0).map(|f| f.name), Some("id".to_string()));
        assert!(result.field_at(2).is_none());
        assert_eq!(result.next_field().map(|f| f.name), Some("id".to_string()));
        assert_eq!(result.next_field().map(|f| f.name), Some("name".to_string()));
        assert!(result.next_field().is_none());
    }

    #[test]
    fn test_free_releases_rows() {
        let mut result = stored(three_rows());
        result.free();
        result.free();
        assert!(!result.is_fetchable());
        assert_eq!(result.row_count(), 0);
    }
}
