use super::*;

mod download;

#[traced_test]
#[tokio::test]
async fn test_year_discovery() -> TestResult<()> {
  let (mut server, dir) = new_server().await;
  let root = page(&mut server, "/", &root_page(&[2023, 2022, 2021]), 2).await;
  let harvester = Harvester::new(test_config(&server, dir.path()))?;

  harvester.preflight().await?;
  let index = harvester.archive().year_index().await;

  assert_eq!(index.years(), vec![2023, 2022, 2021]);
  assert_eq!(index.bounds(), Some((2021, 2023)));
  root.assert_async().await;
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_missing_root_page_has_no_years() -> TestResult<()> {
  let (mut server, dir) = new_server().await;
  let root = server.mock("GET", "/").with_status(503).expect(1).create_async().await;
  let harvester = Harvester::new(test_config(&server, dir.path()))?;

  let error = harvester.archive().year_bounds().await.unwrap_err();

  assert!(matches!(error, HarvesterError::NoYearsFound));
  root.assert_async().await;
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_preflight_reports_unreachable_archive() -> TestResult<()> {
  let dir = tempdir()?;
  // Nothing listens on the discard port
  let config = Config::default()
    .with_base_url("http://127.0.0.1:9")
    .with_download_dir(dir.path().join("papers"))
    .with_metadata_path(dir.path().join("papers_metadata.csv"))
    .with_timeouts(Timeouts { connect_secs: 2, read_secs: 2, total_secs: 2 });
  let harvester = Harvester::new(config)?;

  match harvester.preflight().await {
    Err(HarvesterError::Unreachable { url, .. }) => assert_eq!(url, "http://127.0.0.1:9"),
    other => panic!("expected an unreachable archive, got {other:?}"),
  }
  Ok(())
}
