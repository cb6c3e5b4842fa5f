//! Paginated read helpers.

use super::traits::{LedgerClient, LedgerResult};
use super::types::{Address, DynamicFieldInfo, LedgerObject, ObjectId};

/// Maximum ids per multi-get and items per owned-object page.
pub const PAGE_SIZE: usize = 50;

/// Fetch any number of objects, `PAGE_SIZE` ids per request.
pub async fn get_all_objects(
    ledger: &dyn LedgerClient,
    ids: &[ObjectId],
) -> LedgerResult<Vec<LedgerObject>> {
    let mut objects = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(PAGE_SIZE) {
        objects.extend(ledger.multi_get_objects(chunk).await?);
    }
    Ok(objects)
}

/// Every object of `struct_type` owned by `owner`.
pub async fn all_owned_objects(
    ledger: &dyn LedgerClient,
    owner: &Address,
    struct_type: &str,
) -> LedgerResult<Vec<LedgerObject>> {
    let mut objects = Vec::new();
    let mut cursor = None;
    loop {
        let page = ledger
            .owned_objects(owner, struct_type, cursor, PAGE_SIZE)
            .await?;
        objects.extend(page.data);
        if !page.has_next_page {
            break;
        }
        cursor = page.next_cursor;
    }
    Ok(objects)
}

/// Every dynamic field of `parent`.
pub async fn all_dynamic_fields(
    ledger: &dyn LedgerClient,
    parent: &ObjectId,
) -> LedgerResult<Vec<DynamicFieldInfo>> {
    let mut fields = Vec::new();
    let mut cursor = None;
    loop {
        let page = ledger.dynamic_fields(parent, cursor).await?;
        fields.extend(page.data);
        if !page.has_next_page {
            break;
        }
        cursor = page.next_cursor;
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedgerClient;
    use crate::ledger::objects::coin_type;

    #[tokio::test]
    async fn test_all_owned_objects_walks_every_page() {
        let ledger = MockLedgerClient::new("0x1::wal::WAL");
        let owner = Address::from_bytes([4; 32]);
        for _ in 0..(PAGE_SIZE * 2 + 3) {
            ledger.mint_coin(owner, 1);
        }
        ledger.mint_coin(Address::from_bytes([5; 32]), 1);

        let coins = all_owned_objects(&ledger, &owner, &coin_type("0x1::wal::WAL"))
            .await
            .unwrap();
        assert_eq!(coins.len(), PAGE_SIZE * 2 + 3);
    }

    #[tokio::test]
    async fn test_get_all_objects_chunks_requests() {
        let ledger = MockLedgerClient::new("0x1::wal::WAL");
        let owner = Address::from_bytes([4; 32]);
        let ids: Vec<ObjectId> = (0..120).map(|_| ledger.mint_coin(owner, 1)).collect();

        let objects = get_all_objects(&ledger, &ids).await.unwrap();
        assert_eq!(objects.len(), 120);
        assert_eq!(ledger.multi_get_calls(), 3);
    }
}
