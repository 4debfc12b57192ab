use super::*;

const PDF: &[u8] = b"%PDF-1.5\n%fake paper\n";

#[traced_test]
#[tokio::test]
async fn test_download_only_requested_years() -> TestResult<()> {
  let (mut server, dir) = new_server().await;
  let _root = page(&mut server, "/", &root_page(&[2023, 2022]), 1).await;
  let year_2023 = page(&mut server, "/paper_files/paper/2023", &year_page(2023, &[]), 0).await;
  let year_2022 = page(
    &mut server,
    "/paper_files/paper/2022",
    &year_page(2022, &[
      ("aaa", "Sparse Attention", "Ada Lovelace, Alan Turing"),
      ("bbb", "My/Paper: Draft?", "Grace Hopper"),
    ]),
    1,
  )
  .await;
  let pdf_ok = server
    .mock("GET", "/paper_files/paper/2022/file/aaa-Paper-Conference.pdf")
    .with_status(200)
    .with_header("content-type", "application/pdf")
    .with_body(PDF)
    .expect(1)
    .create_async()
    .await;
  let pdf_broken = server
    .mock("GET", "/paper_files/paper/2022/file/bbb-Paper-Conference.pdf")
    .with_status(500)
    .expect(1)
    .create_async()
    .await;

  let harvester = Harvester::new(test_config(&server, dir.path()))?;
  let report = harvester.run(YearRange::new(2022, 2022)).await?;

  year_2023.assert_async().await;
  year_2022.assert_async().await;
  pdf_ok.assert_async().await;
  pdf_broken.assert_async().await;

  assert_eq!(report.progress.total_papers, 2);
  assert_eq!(report.progress.downloaded_papers, 1);
  assert_eq!(report.progress.failed_papers, 1);
  assert_eq!(report.progress.per_year.len(), 1);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].title, "My/Paper: Draft?");
  assert!(!report.failures[0].outcome.is_persisted());

  let saved = dir.path().join("papers").join("2022").join("Sparse Attention.pdf");
  assert_eq!(std::fs::read(saved)?, PDF);
  assert!(!dir.path().join("papers").join("2022").join("My_Paper__Draft_.pdf").exists());

  let rows = read_csv(&dir.path().join("papers_metadata.csv"))?;
  assert_eq!(rows.len(), 2);
  let broken = rows.iter().find(|row| row.paper_name == "My_Paper__Draft_").unwrap();
  assert_eq!(broken.author, "Grace Hopper");
  assert_eq!(broken.year, 2022);
  assert_eq!(
    broken.pdf_link,
    format!("{}/paper_files/paper/2022/file/bbb-Paper-Conference.pdf", server.url())
  );
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_out_of_range_request_is_rejected() -> TestResult<()> {
  let (mut server, dir) = new_server().await;
  let _root = page(&mut server, "/", &root_page(&[2023, 2022]), 1).await;
  let year_2022 = page(&mut server, "/paper_files/paper/2022", &year_page(2022, &[]), 0).await;

  let harvester = Harvester::new(test_config(&server, dir.path()))?;
  let error = harvester.run(YearRange::new(2021, 2022)).await.unwrap_err();

  assert!(matches!(
    error,
    HarvesterError::InvalidYearRange { start: 2021, min: 2022, max: 2023, .. }
  ));
  assert!(error.to_string().contains("outside the archive bounds 2022-2023"));
  year_2022.assert_async().await;
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_abstracts_in_json_lines() -> TestResult<()> {
  let (mut server, dir) = new_server().await;
  let _root = page(&mut server, "/", &root_page(&[2021]), 1).await;
  let _year = page(
    &mut server,
    "/paper_files/paper/2021",
    &year_page(2021, &[("ccc", "Deep Residual Learning", "Kaiming He")]),
    1,
  )
  .await;
  let detail = page(
    &mut server,
    "/paper_files/paper/2021/hash/ccc-Abstract-Conference.html",
    r#"<html><body><div class="container-fluid"><div class="col">
      <h4>Abstract</h4><p><p>Deeper networks are harder to train.</p></p>
    </div></div></body></html>"#,
    1,
  )
  .await;
  let _pdf = server
    .mock("GET", "/paper_files/paper/2021/file/ccc-Paper-Conference.pdf")
    .with_body(PDF)
    .create_async()
    .await;

  let metadata_path = dir.path().join("papers_metadata.jsonl");
  let config = test_config(&server, dir.path())
    .with_metadata_path(&metadata_path)
    .with_metadata_format(MetadataFormat::JsonLines)
    .with_abstracts(true);
  let report = Harvester::new(config)?.run(YearRange::new(2021, 2021)).await?;

  detail.assert_async().await;
  assert_eq!(report.progress.downloaded_papers, 1);
  let content = std::fs::read_to_string(&metadata_path)?;
  let record: MetadataRecord = serde_json::from_str(content.trim())?;
  assert_eq!(record.paper_name, "Deep Residual Learning");
  assert_eq!(record.abstract_text.as_deref(), Some("Deeper networks are harder to train."));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_second_run_appends_metadata() -> TestResult<()> {
  let (mut server, dir) = new_server().await;
  let _root = page(&mut server, "/", &root_page(&[2020]), 2).await;
  let _year = page(
    &mut server,
    "/paper_files/paper/2020",
    &year_page(2020, &[("ddd", "Language Models are Few-Shot Learners", "Tom Brown")]),
    2,
  )
  .await;
  let _pdf = server
    .mock("GET", "/paper_files/paper/2020/file/ddd-Paper-Conference.pdf")
    .with_body(PDF)
    .expect(2)
    .create_async()
    .await;

  for _ in 0..2 {
    let harvester = Harvester::new(test_config(&server, dir.path()))?;
    harvester.run(YearRange::new(2020, 2020)).await?;
  }

  let content = std::fs::read_to_string(dir.path().join("papers_metadata.csv"))?;
  assert_eq!(content.lines().filter(|line| line.starts_with("paper_name,")).count(), 1);
  assert_eq!(read_csv(&dir.path().join("papers_metadata.csv"))?.len(), 2);
  Ok(())
}
