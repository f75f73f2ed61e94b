//! Built-in sample ebook, for `--sample` runs and tests.
//!
//! It exercises every markup convention (sub-headings, highlight labels,
//! glyph and numbered bullets, blank lines) plus the optional front and back
//! matter.

use crate::model::{
    Analysis, BookInfo, ChapterContent, ChapterMeta, EbookDocument, Marketing, Phase,
    ProblemSolved, ValueSummary,
};

/// A 1×1 PNG as a data URI.
pub const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

fn meta(num: u32, title: &str, phase: Phase, before: &str, after: &str) -> ChapterMeta {
    ChapterMeta {
        chapter_num: Some(num),
        title: title.to_string(),
        phase: Some(phase),
        before_state: Some(before.to_string()),
        after_state: Some(after.to_string()),
        ..ChapterMeta::default()
    }
}

const CHAPTER_1: &str = "== 월급의 한계 ==

현대 직장인의 가장 큰 고민은 '월급으로는 부족하다'는 현실입니다. 물가는 오르고 생활비는 늘지만 월급 인상률은 이를 따라가지 못합니다.

[핵심 포인트] 월급만 바라보는 삶의 위험성

- 물가 상승률 연 3~5%, 평균 임금 인상률은 2~3%
- 하나의 수입원에 의존하면 갑작스런 실직에 취약
- 부수입 없이는 노후 준비가 사실상 불가능

== 부수입이 바꾸는 삶 ==

부수입 월 100만원은 단순한 추가 금액이 아닙니다. 심리적 안정감과 선택의 자유를 가져다줍니다.

[실전 팁] 100만원의 진짜 의미

연간 1,200만원은 20년이면 2억 4천만원 이상의 차이를 만들어냅니다.

- 복리 효과: 일찍 시작할수록 결과가 크다
- 스킬 축적: 시간이 지날수록 더 쉬워진다
- 네트워크 형성: 부수입 활동을 통한 인맥 확장";

const CHAPTER_2: &str = "== 디지털 부수입 ==

인터넷만 있으면 시작할 수 있는 방법들이 폭발적으로 늘었습니다.

- 전자책 출판: 전문 지식을 PDF로 판매
- 온라인 강의: 유데미, 클래스101 플랫폼 활용
- 블로그/유튜브: 광고 수익과 협찬
- 프리랜서: 크몽, 탈잉에서 전문 스킬 판매

== 오프라인 부수입 ==

디지털이 익숙하지 않다면 오프라인에서도 기회가 충분합니다.

- 중고 거래: 집 안 물건 정리하며 수입 창출
- 재능 공유: 요리, 운동, 악기 개인 레슨
- 단기 알바: 주말 이벤트 스태프

[핵심 포인트] 선택 기준 4가지

1. 현재 보유 스킬과 지식
2. 투자 가능 시간 (주당 5~10시간)
3. 초기 투자 비용 (0~50만원)
4. 빠른 수익화 가능 여부";

const CHAPTER_3: &str = "== 30일 행동 계획 ==

이론보다 실행이 중요합니다. 다음 계획을 그대로 따라하면 첫 수입을 만들 수 있습니다.

[1주차] 기반 다지기

- 판매할 상품/서비스 1개 확정
- 플랫폼 계정 생성 및 프로필 완성
- 첫 포스팅 또는 상품 등록

[2주차] 첫 고객 만들기

- 지인 10명에게 소개
- SNS 홍보 시작
- 첫 피드백 수집 및 개선

[3주차] 수익 창출

- 가격 정책 최적화
- 반복 구매 유도 전략 실행
- 리뷰 수집 및 신뢰 구축

[4주차] 확장

- 성과 분석 및 개선점 파악
- 두 번째 상품/서비스 기획
- 자동화 시스템 구축 시작";

const CHAPTER_4: &str = "== 수입 안정화 전략 ==

첫 수입을 만들었다면 이제 안정화하고 성장시켜야 합니다.

[핵심 포인트] 패시브 인컴으로의 전환

처음에는 시간을 팔지만, 궁극적으로는 자동으로 수입이 들어오는 구조를 만들어야 합니다.

== 3단계 성장 로드맵 ==

1단계: 활성 수입 (시간 = 돈)
- 프리랜서, 레슨, 단기 알바 → 월 30~50만원

2단계: 반패시브 수입
- 전자책, 온라인 강의, 블로그 → 월 70~100만원

3단계: 패시브 수입
- 배당주, 부동산 수익, 로열티 → 월 100만원 이상

[실전 팁] 수입 다각화

- 최소 3개 이상의 수입원 유지
- 디지털 + 오프라인 조합 권장
- 월 1회 성과 리뷰 및 전략 수정";

const PROLOGUE: &str = "매달 25일, 통장에 월급이 들어오는 순간은 잠깐 기쁘고 곧 불안해집니다.

이 책은 퇴근 후 두 시간으로 두 번째 수입원을 만드는 방법을 다룹니다.

[핵심 포인트] 완벽한 준비보다 작은 실행이 먼저입니다";

const EPILOGUE: &str = "여기까지 읽었다면 이미 절반은 시작한 것입니다.

오늘 밤 30분만 투자해 첫 번째 행동을 정해 보세요.";

/// The four-chapter side-income guide.
pub fn sample_document() -> EbookDocument {
    let chapters = vec![
        meta(
            1,
            "왜 지금 부수입이 필요한가",
            Phase::ProblemAwareness,
            "월급만으로는 부족하다는 막막함",
            "부수입의 필요성과 가능성을 명확히 이해",
        ),
        meta(
            2,
            "나에게 맞는 부수입 방법 찾기",
            Phase::MethodDiscovery,
            "어떤 방법이 맞는지 몰라 망설임",
            "자신의 상황에 최적화된 방법 선택 완료",
        ),
        meta(
            3,
            "첫 달 수입 만들기: 실전 30일",
            Phase::Execution,
            "계획만 있고 실행을 못하는 상태",
            "첫 번째 수입을 실제로 만들어낸 경험",
        ),
        meta(
            4,
            "수입을 안정화하고 확장하기",
            Phase::Confidence,
            "불규칙한 수입으로 인한 불안감",
            "안정적이고 성장하는 부수입 시스템 완성",
        ),
    ];
    let chapters_content = chapters
        .iter()
        .zip([CHAPTER_1, CHAPTER_2, CHAPTER_3, CHAPTER_4])
        .map(|(meta, content)| ChapterContent {
            chapter: meta.clone(),
            content: content.to_string(),
        })
        .collect();
    let toc = chapters
        .iter()
        .map(|c| ChapterMeta {
            before_state: None,
            after_state: None,
            ..c.clone()
        })
        .collect();

    EbookDocument {
        topic: "직장인 퇴근 후 월 100만원 부수입 만들기".to_string(),
        book_info: BookInfo {
            title: "퇴근 후 100만원 만들기".to_string(),
            subtitle: "직장인을 위한 부수입 실전 가이드".to_string(),
            author: Some("AI 전자책 생성기".to_string()),
            chapters: toc,
        },
        chapters_content,
        analysis: Some(Analysis {
            problem_solved: Some(ProblemSolved {
                time: Some("수개월의 시행착오를 수주로 단축".to_string()),
                money: Some("잘못된 투자 방지로 수십만원 절약".to_string()),
                emotion: Some("막막함에서 명확한 로드맵으로".to_string()),
            }),
            why_pay: Some("이 책은 수천 시간의 실전 경험을 압축한 결과물입니다.".to_string()),
            target_reader: Some(
                "부수입을 원하지만 어디서 시작할지 모르는 20~40대 직장인".to_string(),
            ),
            ..Analysis::default()
        }),
        marketing: Some(Marketing {
            sales_copy: Some(
                "퇴근 후 2시간으로 월 100만원을 만드는 직장인들의 비밀을 공개합니다.".to_string(),
            ),
            value_summary: Some(ValueSummary {
                time_saved: Some("6개월 시행착오 단축".to_string()),
                money_saved: Some("잘못된 투자 30만원 절약".to_string()),
                mistakes_prevented: Some("흔한 실수 10가지 예방".to_string()),
            }),
            ..Marketing::default()
        }),
        prologue: Some(PROLOGUE.to_string()),
        epilogue: Some(EPILOGUE.to_string()),
        chapter_images: Vec::new(),
        cover_url: None,
    }
}

/// Read one entry of a ZIP container as text.
#[cfg(test)]
pub fn read_part(bytes: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    out
}

/// Panics unless `xml` parses with matching tags.
#[cfg(test)]
pub fn assert_well_formed(xml: &str) {
    use quick_xml::events::Event;
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("malformed XML at {}: {e}", reader.buffer_position()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{tokenize, ContentBlock};

    #[test]
    fn sample_is_consistent() {
        let doc = sample_document();
        assert!(doc.check_consistency().is_ok());
        assert_eq!(doc.chapters_content.len(), 4);
        assert_eq!(doc.chapter_number(3), 4);
    }

    #[test]
    fn sample_uses_every_block_kind() {
        let doc = sample_document();
        let blocks: Vec<ContentBlock> = doc
            .chapters_content
            .iter()
            .flat_map(|c| tokenize(&c.content))
            .collect();
        assert!(blocks.iter().any(|b| matches!(b, ContentBlock::Heading(_))));
        assert!(blocks.iter().any(|b| matches!(b, ContentBlock::HighlightLabel { .. })));
        assert!(blocks.iter().any(|b| matches!(b, ContentBlock::Bullet(t) if t.starts_with("1. "))));
        assert!(blocks.iter().any(|b| matches!(b, ContentBlock::Paragraph(_))));
        assert!(blocks.contains(&ContentBlock::Blank));
    }

    #[test]
    fn sample_round_trips_through_json() {
        let doc = sample_document();
        assert_eq!(EbookDocument::from_json(&doc.to_json()).unwrap(), doc);
    }
}
