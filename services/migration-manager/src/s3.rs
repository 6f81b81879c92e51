// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! S3-compatible object store
//!
//! Uses path-style addressing with static credentials so it works against
//! MinIO and similar services as well as AWS.

use std::collections::VecDeque;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use futures_util::{StreamExt, TryStreamExt};
use http_body::Frame;
use http_body_util::StreamBody;
use tokio_util::io::ReaderStream;

use crate::config::StoreConfig;
use crate::store::{ObjectEntry, ObjectInfo, ObjectListing, ObjectReader, ObjectStore, StoreError};

/// Object store handle bound to one bucket
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "migration-manager",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.location.clone()))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            // Many S3-compatible services reject the SDK's default
            // aws-chunked checksum trailers
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

fn service_error<E: std::error::Error>(op: &str, key: &str, e: E) -> StoreError {
    StoreError::Service(format!("{} {}: {}", op, key, DisplayErrorContext(e)))
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_objects(&self, prefix: &str) -> ObjectListing {
        let pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        let prefix = prefix.to_string();

        futures_util::stream::unfold(
            (pages, VecDeque::new(), false),
            move |(mut pages, mut buffered, done)| {
                let prefix = prefix.clone();
                async move {
                    loop {
                        if let Some(entry) = buffered.pop_front() {
                            return Some((Ok(entry), (pages, buffered, done)));
                        }
                        if done {
                            return None;
                        }
                        match pages.next().await {
                            Some(Ok(page)) => {
                                for object in page.contents() {
                                    if let Some(key) = object.key() {
                                        buffered.push_back(ObjectEntry {
                                            key: key.to_string(),
                                            size: object.size().unwrap_or(0).max(0) as u64,
                                        });
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                let err = service_error("list", &prefix, e);
                                return Some((Err(err), (pages, buffered, true)));
                            }
                            None => return None,
                        }
                    }
                }
            },
        )
        .boxed()
    }

    async fn stat_object(&self, key: &str) -> Result<ObjectInfo, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    service_error("stat", key, e)
                }
            })?;

        Ok(ObjectInfo {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
        })
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    service_error("get", key, e)
                }
            })?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn put_object(
        &self,
        key: &str,
        body: ObjectReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let frames = ReaderStream::new(body).map_ok(Frame::data);
        let body = ByteStream::from_body_1_x(StreamBody::new(frames));

        let length = i64::try_from(size)
            .map_err(|_| StoreError::Service(format!("put {}: size {} out of range", key, size)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(length)
            .set_content_type(content_type.map(str::to_string))
            .body(body)
            .send()
            .await
            .map_err(|e| service_error("put", key, e))?;

        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(service_error("head bucket", &self.bucket, e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{method, path, path_regex, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_config(endpoint: &str, use_ssl: bool) -> StoreConfig {
        StoreConfig {
            location: "us-east-1".to_string(),
            endpoint: endpoint.to_string(),
            bucket: "bucket".to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            use_ssl,
        }
    }

    #[test]
    fn handle_is_bound_to_configured_bucket() {
        let store = S3Store::new(&store_config("minio.local:9000", false));
        assert_eq!(store.bucket(), "bucket");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        // Nothing listens on port 9 of localhost
        let store = S3Store::new(&store_config("127.0.0.1:9", false));
        assert!(store.bucket_exists().await.is_err());
    }

    fn list_page(keys: &[(&str, u64)], next_token: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|(key, size)| {
                format!("<Contents><Key>{}</Key><Size>{}</Size></Contents>", key, size)
            })
            .collect();
        let truncation = match next_token {
            Some(token) => format!(
                "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
                token
            ),
            None => "<IsTruncated>false</IsTruncated>".to_string(),
        };
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Name>bucket</Name><Prefix>A/</Prefix><KeyCount>{}</KeyCount>\
             <MaxKeys>1000</MaxKeys>{}{}</ListBucketResult>",
            keys.len(),
            truncation,
            contents
        )
    }

    fn xml(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "application/xml")
    }

    #[tokio::test]
    async fn listing_follows_continuation_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/bucket/?$"))
            .and(query_param("list-type", "2"))
            .and(query_param_is_missing("continuation-token"))
            .respond_with(xml(list_page(&[("A/1", 3), ("A/2", 4)], Some("page-2"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/bucket/?$"))
            .and(query_param("list-type", "2"))
            .and(query_param("continuation-token", "page-2"))
            .respond_with(xml(list_page(&[("A/deep/3", 5)], None)))
            .expect(1)
            .mount(&server)
            .await;

        let store = S3Store::new(&store_config(&server.uri(), false));
        let entries: Vec<ObjectEntry> = store.list_objects("A/").try_collect().await.unwrap();

        assert_eq!(
            entries,
            vec![
                ObjectEntry { key: "A/1".to_string(), size: 3 },
                ObjectEntry { key: "A/2".to_string(), size: 4 },
                ObjectEntry { key: "A/deep/3".to_string(), size: 5 },
            ]
        );
    }

    #[tokio::test]
    async fn listing_error_ends_the_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/bucket/?$"))
            .respond_with(ResponseTemplate::new(403).set_body_raw(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                "application/xml",
            ))
            .mount(&server)
            .await;

        let store = S3Store::new(&store_config(&server.uri(), false));
        let results: Vec<_> = store.list_objects("A/").collect().await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(StoreError::Service(_))));
    }

    #[tokio::test]
    async fn put_streams_body_with_length_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/A/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = S3Store::new(&store_config(&server.uri(), false));
        let body: ObjectReader = Box::pin(std::io::Cursor::new(b"hello world".to_vec()));
        store
            .put_object("A/1", body, 11, Some("text/plain"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.body, b"hello world");
        assert_eq!(
            request.headers.get("content-length").unwrap().to_str().unwrap(),
            "11"
        );
        assert_eq!(
            request.headers.get("content-type").unwrap().to_str().unwrap(),
            "text/plain"
        );
    }

    #[tokio::test]
    async fn get_reads_body_and_maps_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/A/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bucket/A/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <Error><Code>NoSuchKey</Code>\
                     <Message>The specified key does not exist.</Message>\
                     <Key>A/missing</Key></Error>",
                    "application/xml",
                ),
            )
            .mount(&server)
            .await;

        let store = S3Store::new(&store_config(&server.uri(), false));

        let mut reader = store.get_object("A/1").await.unwrap();
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"payload");

        let err = store.get_object("A/missing").await.err().unwrap();
        assert!(matches!(err, StoreError::NotFound(key) if key == "A/missing"));
    }
}
