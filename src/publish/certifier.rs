//! Blob certification.
//!
//! Confirmations collected by the writer are aggregated into one certificate
//! per blob, and certificates are submitted `limits.certifications` at a
//! time.

use tracing::info;

use super::blob::{BlobSet, BlobState};
use super::error::{PublishError, PublishResult};
use super::pipeline::PublishContext;
use crate::config::SystemObjects;
use crate::ledger::{Command, ObjectId, ProgrammableTransaction, TransactionBuilder};
use crate::storage::{BlobCertificate, Committee};

/// Certify every written blob.
pub async fn certify_blobs(
    ctx: &PublishContext,
    blobs: &mut BlobSet,
    committee: &Committee,
) -> PublishResult<()> {
    let written = blobs.ids_in_state(BlobState::Written);

    for chunk in written.chunks(ctx.config.limits.certifications) {
        let mut certificates = Vec::with_capacity(chunk.len());
        for blob_id in chunk {
            let blob = blobs
                .get(blob_id)
                .ok_or(PublishError::NotRegistered(*blob_id))?;
            let object_id = blob.object_id.ok_or(PublishError::NotRegistered(*blob_id))?;
            let certificate = ctx
                .storage
                .certify(blob_id, &blob.confirmations, committee)
                .await?;
            certificates.push((object_id, certificate));
        }

        let tx = certification_transaction(&ctx.config.system, &certificates);
        ctx.executor.execute("certify blobs", tx).await?;
        info!(blobs = chunk.len(), "Certified blobs");

        for blob_id in chunk {
            if let Some(blob) = blobs.get_mut(blob_id) {
                blob.mark_certified();
            }
        }
    }
    Ok(())
}

/// One `certify_blob` call per `(blob object, certificate)`.
pub fn certification_transaction(
    system: &SystemObjects,
    certificates: &[(ObjectId, BlobCertificate)],
) -> ProgrammableTransaction {
    let mut builder = TransactionBuilder::new();
    let system_arg = builder.object(system.system_object_id);
    for (object_id, certificate) in certificates {
        let blob = builder.object(*object_id);
        builder.command(Command::CertifyBlob {
            package: system.system_package_id,
            system: system_arg,
            blob,
            signature: certificate.signature.clone(),
            signers: certificate.signers.clone(),
            message: certificate.serialized_message.clone(),
        });
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CommandKind;

    #[test]
    fn test_one_command_per_certificate() {
        let system = SystemObjects {
            system_object_id: ObjectId::from_bytes([1; 32]),
            system_package_id: ObjectId::from_bytes([2; 32]),
            ..Default::default()
        };
        let certificate = BlobCertificate {
            signers: vec![0, 1, 2],
            serialized_message: vec![7],
            signature: vec![9],
        };
        let certificates: Vec<_> = (0..3u8)
            .map(|i| (ObjectId::from_bytes([i + 10; 32]), certificate.clone()))
            .collect();

        let tx = certification_transaction(&system, &certificates);
        assert_eq!(tx.commands.len(), 3);
        assert_eq!(tx.count(CommandKind::CertifyBlob), 3);
        match &tx.commands[1] {
            Command::CertifyBlob {
                package,
                blob,
                signers,
                ..
            } => {
                assert_eq!(*package, ObjectId::from_bytes([2; 32]));
                assert_eq!(*blob, crate::ledger::Argument::Object(ObjectId::from_bytes([11; 32])));
                assert_eq!(signers, &vec![0, 1, 2]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
