/// Narrative shown whenever a real diagnosis cannot be produced. A pure
/// function of the code.
pub fn fallback_message(code: &str) -> String {
    format!(
        "【{code}】のAI診断レポート\n\n\
         現在、{code}の詳細な診断データを取得できませんでした。\
         市場の状況や銘柄情報の更新状況によっては、分析結果の生成に時間がかかる場合があります。\n\n\
         ■ 確認のポイント\n\
         ・直近の株価推移と出来高の変化\n\
         ・PER・PBRなどのバリュエーション指標\n\
         ・業績発表や配当方針などの企業ニュース\n\n\
         より詳しい分析や最新の市場動向については、LINEにて無料でご案内しています。\n\n\
         ※本診断は情報提供を目的としたものであり、投資判断はご自身の責任で行ってください。"
    )
}
